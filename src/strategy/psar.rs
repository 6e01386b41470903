//! Parabolic SAR breakout strategy on minute bars
//!
//! The SAR recurrence runs on coarse `window`-hour buckets. Each fine bar sees
//! the trend of the bucket it falls in and the SAR projected for that bucket
//! by the previous one. A fine bar whose range contains the projected SAR is a
//! signal in the direction of the bucket's trend. Only the first signal of each
//! midnight-aligned `window`-hour zone is kept, and the market filters decide
//! whether it is traded and at what size.

use super::{MarketData, SeriesSpec, Strategy, StrategyContext};
use crate::config::{PsarParams, PsarSettings, TradeSizes};
use crate::data::aggregate_from;
use crate::indicators::{compute_psar, pct_change, rolling_max, rolling_min, rolling_std};
use crate::models::{Bar, TradeDecision, TradeType, Triggers};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};

const MINUTES_PER_YEAR: f64 = 365.0 * 24.0 * 60.0;

/// Volatility regime a signal is sized for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeCondition {
    HighVol,
    LowVol,
}

/// Per-bar output of the PSAR pipeline, aligned with the fine bars
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PsarSignals {
    /// Decluttered raw signal (1, -1 or 0)
    pub signal: Vec<i8>,
    /// Signal that passed the market filters
    pub final_signal: Vec<i8>,
    /// Annualized volatility of minute returns over `mt_len` bars
    pub mt_vol: Vec<Option<f64>>,
    pub trade_condition: Vec<TradeCondition>,
}

/// Raw PSAR signals for fine bars of `fine_minutes`
pub fn raw_signals(bars: &[Bar], fine_minutes: i64, settings: &PsarSettings) -> Vec<i8> {
    // Coarse buckets count from midnight of the first fine bar's day
    let origin = bars
        .first()
        .map(|b| b.open_time.date_naive().and_time(NaiveTime::MIN).and_utc())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let coarse = aggregate_from(bars, settings.window * 60, origin);
    let psar = compute_psar(&coarse, settings.start, settings.increment, settings.maximum);

    // As-of backward merge: each fine bar takes the bucket it opens in
    let mut next_bar = Vec::with_capacity(bars.len());
    let mut uptrend = Vec::with_capacity(bars.len());
    let mut bucket = 0;
    for bar in bars {
        while bucket + 1 < coarse.len() && coarse[bucket + 1].open_time <= bar.open_time {
            bucket += 1;
        }
        let matched = coarse.get(bucket).filter(|c| c.open_time <= bar.open_time);
        next_bar.push(matched.and_then(|_| psar.next_bar[bucket]));
        uptrend.push(matched.and_then(|_| psar.uptrend[bucket]));
    }

    // The projection for a bucket comes from the bucket before it
    let shift = settings.shift_rows(fine_minutes);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let projected = i.checked_sub(shift).and_then(|j| next_bar[j]);
            match (projected, uptrend[i]) {
                (Some(sar), Some(up)) if sar < bar.high && sar > bar.low => {
                    if up {
                        1
                    } else {
                        -1
                    }
                }
                _ => 0,
            }
        })
        .collect()
}

fn zone_start(t: DateTime<Utc>, window_hours: i64) -> DateTime<Utc> {
    let midnight = t.date_naive().and_time(NaiveTime::MIN).and_utc();
    let hour = t.hour() as i64;
    midnight + Duration::hours(hour / window_hours * window_hours)
}

/// Keep only the first non-zero signal in each `window_hours` zone
pub fn declutter(times: &[DateTime<Utc>], signals: &mut [i8], window_hours: i64) {
    let mut zone: Option<DateTime<Utc>> = None;

    for (t, signal) in times.iter().zip(signals.iter_mut()) {
        if *signal == 0 {
            continue;
        }
        match zone {
            Some(z) if *t > z && *t < z + Duration::hours(window_hours) => *signal = 0,
            _ => zone = Some(zone_start(*t, window_hours)),
        }
    }
}

/// Apply the return, peak/valley and volatility filters to decluttered signals
pub fn apply_market_filters(closes: &[f64], signal: Vec<i8>, params: &PsarParams) -> PsarSignals {
    let ret = pct_change(closes, 1);
    let rol_ret = pct_change(closes, params.rolling_ret_period);
    let scale = MINUTES_PER_YEAR.sqrt();
    let mt_vol: Vec<Option<f64>> = rolling_std(&ret, params.mt_len)
        .into_iter()
        .map(|v| v.map(|std| std * scale))
        .collect();
    let peak = rolling_max(closes, params.rolling_peak_valley_period);
    let valley = rolling_min(closes, params.rolling_peak_valley_period);

    let final_signal = (0..closes.len())
        .map(|i| {
            let max_chg = match (peak[i], valley[i]) {
                (Some(p), Some(v)) if v != 0.0 => Some(p / v - 1.0),
                _ => None,
            };
            let calm_return = rol_ret[i].is_some_and(|r| r.abs() < params.rolling_ret_thresh);
            let narrow_range = max_chg.is_some_and(|c| c < params.peak_valley_chg_thresh);

            if calm_return && narrow_range && signal[i] != 0 && mt_vol[i].is_some() {
                signal[i]
            } else {
                0
            }
        })
        .collect();

    let trade_condition = mt_vol
        .iter()
        .map(|v| match v {
            Some(vol) if *vol < params.vol_thresh => TradeCondition::LowVol,
            _ => TradeCondition::HighVol,
        })
        .collect();

    PsarSignals {
        signal,
        final_signal,
        mt_vol,
        trade_condition,
    }
}

/// Full pipeline: raw signals, declutter, market filters
pub fn psar_signals(bars: &[Bar], params: &PsarParams, settings: &PsarSettings) -> PsarSignals {
    let mut signal = raw_signals(bars, params.bar_minutes, settings);
    let times: Vec<DateTime<Utc>> = bars.iter().map(|b| b.open_time).collect();
    declutter(&times, &mut signal, settings.window);

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    apply_market_filters(&closes, signal, params)
}

pub struct PsarStrategy {
    context: StrategyContext,
    params: PsarParams,
    min_candles: usize,
}

impl PsarStrategy {
    pub fn new(context: StrategyContext, params: PsarParams, min_candles: usize) -> Self {
        Self {
            context,
            params,
            min_candles,
        }
    }
}

impl Strategy for PsarStrategy {
    fn name(&self) -> &str {
        &self.context.name
    }

    fn symbol(&self) -> &str {
        &self.context.symbol
    }

    fn trading_series(&self) -> SeriesSpec {
        self.context.trading
    }

    fn daily_series(&self) -> Option<SeriesSpec> {
        self.context.daily_series()
    }

    fn min_candles_required(&self) -> usize {
        self.min_candles
    }

    /// Trade the newest bar's final signal as is
    ///
    /// Decluttering already limits signals to one per zone, so there is no
    /// repeat suppression here.
    fn evaluate(&self, data: &MarketData) -> Result<TradeDecision> {
        self.context.ensure_enough(data, self.min_candles)?;

        let settings = self
            .params
            .settings_for(&self.context.symbol)
            .with_context(|| format!("No PSAR settings for {}", self.context.symbol))?;
        let signals = psar_signals(&data.trading, &self.params, settings);

        let long: Vec<bool> = signals.final_signal.iter().map(|s| *s == 1).collect();
        let short: Vec<bool> = signals.final_signal.iter().map(|s| *s == -1).collect();
        let triggers = self.context.mask(Triggers {
            long_entries: Some(long),
            short_entries: Some(short),
            ..Triggers::default()
        });
        let (triggers, current_regime_class) = self.context.gate(triggers, data)?;

        let last = |side: &Option<Vec<bool>>| {
            side.as_ref()
                .and_then(|v| v.last().copied())
                .unwrap_or(false)
        };
        let condition = signals
            .trade_condition
            .last()
            .copied()
            .unwrap_or(TradeCondition::HighVol);
        let size = |sizes: &TradeSizes| match condition {
            TradeCondition::HighVol => sizes.high_vol,
            TradeCondition::LowVol => sizes.low_vol,
        };

        let (trade_type, perc_equity) = if last(&triggers.long_entries) {
            (
                Some(TradeType::EntryLong),
                Some(size(&self.params.trade_sizes_long)),
            )
        } else if last(&triggers.short_entries) {
            (
                Some(TradeType::EntryShort),
                Some(size(&self.params.trade_sizes_short)),
            )
        } else {
            (None, None)
        };

        if let Some(trade_type) = trade_type {
            tracing::debug!(
                "PSAR {} on {} ({:?}, mt_vol {:?})",
                trade_type,
                self.context.symbol,
                condition,
                signals.mt_vol.last().copied().flatten()
            );
        }

        Ok(TradeDecision {
            trade_type,
            perc_equity,
            current_regime_class,
            bar_time: data.trading.last().map(|b| b.open_time),
            ..TradeDecision::none()
        })
    }
}
