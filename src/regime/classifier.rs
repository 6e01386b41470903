//! Volatility × trend regime classifier over daily bars
//!
//! |                     | Bull | Sideways | Bear |
//! |---------------------|------|----------|------|
//! | Above Avg volatility|  1   |    3     |  5   |
//! | Below Avg volatility|  2   |    4     |  6   |
//!
//! Volatility is Above Avg when the 21-day annualized volatility exceeds the
//! 365-day one. Trend is Bull when the close is above both the 21-day and
//! 88-day SMA, Bear when below both, Sideways otherwise.

use crate::indicators::{pct_change, rolling_std, sma_series};
use crate::models::{Bar, RegimeRecord, TrendClass, VolatilityClass};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Regime class for a volatility/trend pair
pub fn regime_class(volatility: VolatilityClass, trend: TrendClass) -> u8 {
    match (volatility, trend) {
        (VolatilityClass::AboveAvg, TrendClass::Bull) => 1,
        (VolatilityClass::BelowAvg, TrendClass::Bull) => 2,
        (VolatilityClass::AboveAvg, TrendClass::Sideways) => 3,
        (VolatilityClass::BelowAvg, TrendClass::Sideways) => 4,
        (VolatilityClass::AboveAvg, TrendClass::Bear) => 5,
        (VolatilityClass::BelowAvg, TrendClass::Bear) => 6,
    }
}

fn trend_class(close: f64, fast_ma: f64, slow_ma: f64) -> TrendClass {
    if close > fast_ma && close > slow_ma {
        TrendClass::Bull
    } else if (close >= fast_ma && close <= slow_ma) || (close <= fast_ma && close >= slow_ma) {
        TrendClass::Sideways
    } else {
        TrendClass::Bear
    }
}

pub struct RegimeClassifier {
    fast_vol_days: usize,
    slow_vol_days: usize,
    fast_ma_days: usize,
    slow_ma_days: usize,
    annualization: f64,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self {
            fast_vol_days: 21,
            slow_vol_days: 365,
            fast_ma_days: 21,
            slow_ma_days: 88,
            annualization: 365.0,
        }
    }
}

impl RegimeClassifier {
    /// Daily bars needed before the slowest window is defined
    pub fn warmup_bars(&self) -> usize {
        (self.slow_vol_days + 1).max(self.slow_ma_days)
    }

    /// One record per daily bar, stamped with the bar's open time
    pub fn classify_daily(&self, daily: &[Bar]) -> Vec<RegimeRecord> {
        let closes: Vec<f64> = daily.iter().map(|b| b.close).collect();
        let returns = pct_change(&closes, 1);
        let scale = self.annualization.sqrt();

        let fast_vol = rolling_std(&returns, self.fast_vol_days);
        let slow_vol = rolling_std(&returns, self.slow_vol_days);
        let fast_ma = sma_series(&closes, self.fast_ma_days);
        let slow_ma = sma_series(&closes, self.slow_ma_days);

        daily
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                let volatility_ratio = match (fast_vol[i], slow_vol[i]) {
                    (Some(fast), Some(slow)) if slow > 0.0 => Some((fast * scale) / (slow * scale)),
                    _ => None,
                };
                let volatility_class = volatility_ratio.map(|ratio| {
                    if ratio > 1.0 {
                        VolatilityClass::AboveAvg
                    } else {
                        VolatilityClass::BelowAvg
                    }
                });
                let trend = match (fast_ma[i], slow_ma[i]) {
                    (Some(fast), Some(slow)) => Some(trend_class(bar.close, fast, slow)),
                    _ => None,
                };
                let class = match (volatility_class, trend) {
                    (Some(v), Some(t)) => regime_class(v, t),
                    _ => 0,
                };

                RegimeRecord {
                    timestamp: bar.open_time,
                    volatility_ratio,
                    volatility_class,
                    trend_class: trend,
                    regime_class: class,
                }
            })
            .collect()
    }

    /// Daily regimes forward-filled onto the trading bars' frequency
    ///
    /// The grid covers the trading bars only, from the first one through the
    /// last, so intraday bars after the newest daily bar still get a regime.
    pub fn classify(&self, daily: &[Bar], trading: &[Bar]) -> Vec<RegimeRecord> {
        let records = self.classify_daily(daily);

        match (infer_frequency(trading), trading.first(), trading.last()) {
            (Some(freq), Some(first), Some(last)) => {
                upsample(&records, freq, first.open_time, last.open_time)
            }
            _ => records,
        }
    }
}

/// Most common gap between consecutive open times (smallest on ties)
pub fn infer_frequency(bars: &[Bar]) -> Option<Duration> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in bars.windows(2) {
        let delta = (pair[1].open_time - pair[0].open_time).num_seconds();
        if delta > 0 {
            *counts.entry(delta).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|(da, ca), (db, cb)| ca.cmp(cb).then(db.cmp(da)))
        .map(|(delta, _)| Duration::seconds(delta))
}

/// Forward-fill records onto a regular grid from `from` through `until`
///
/// The grid never starts before the first record, since nothing is known
/// there yet.
pub fn upsample(
    records: &[RegimeRecord],
    freq: Duration,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<RegimeRecord> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    if freq <= Duration::zero() {
        return records.to_vec();
    }

    let mut out = Vec::new();
    let mut source = 0;
    let mut t = from.max(first.timestamp);

    while t <= until {
        while source + 1 < records.len() && records[source + 1].timestamp <= t {
            source += 1;
        }
        out.push(RegimeRecord {
            timestamp: t,
            ..records[source].clone()
        });
        t += freq;
    }

    out
}

/// Regime class in force at `timestamp` (0 before the first record)
pub fn regime_at(records: &[RegimeRecord], timestamp: DateTime<Utc>) -> u8 {
    let idx = records.partition_point(|r| r.timestamp <= timestamp);
    if idx == 0 {
        0
    } else {
        records[idx - 1].regime_class
    }
}
