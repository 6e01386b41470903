use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV bar for a single (symbol, duration) series
///
/// `close_time` is always `open_time + duration`. Equality compares every field,
/// which is what the updater uses to tell a fresh bar from a repeated poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl Bar {
    /// Build a bar from its close time and nominal duration
    pub fn from_close(
        close_time: DateTime<Utc>,
        duration_minutes: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<f64>,
    ) -> Self {
        Self {
            open_time: close_time - Duration::minutes(duration_minutes),
            close_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Bar duration in whole minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.close_time - self.open_time).num_minutes()
    }
}

/// Trade direction a strategy is allowed to take
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

/// Discrete trade instruction sent to the execution systems
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TradeType {
    #[serde(rename = "Entry Long")]
    EntryLong,
    #[serde(rename = "Entry Short")]
    EntryShort,
    #[serde(rename = "Exit Long")]
    ExitLong,
    #[serde(rename = "Exit Short")]
    ExitShort,
    /// Close whatever is open. Accepted on the wire and by the execution
    /// systems, but the shipped strategies only ever exit one side, so the
    /// decision path never selects it.
    #[serde(rename = "Exit Position")]
    ExitPosition,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::EntryLong => "Entry Long",
            TradeType::EntryShort => "Entry Short",
            TradeType::ExitLong => "Exit Long",
            TradeType::ExitShort => "Exit Short",
            TradeType::ExitPosition => "Exit Position",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one decision pass
///
/// `trade_type == None` means "no signal" for this cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeDecision {
    pub trade_type: Option<TradeType>,
    pub perc_equity: Option<f64>,
    pub sl_stop: Option<f64>,
    pub tp_stop: Option<f64>,
    pub current_regime_class: Option<u8>,
    /// Open time of the bar the decision was computed on
    pub bar_time: Option<DateTime<Utc>>,
}

impl TradeDecision {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_signal(&self) -> bool {
        self.trade_type.is_some()
    }
}

/// Per-bar entry/exit triggers for one strategy evaluation
///
/// A side is `None` when its direction is not traded. Vectors are aligned with
/// the trading window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triggers {
    pub long_entries: Option<Vec<bool>>,
    pub long_exits: Option<Vec<bool>>,
    pub short_entries: Option<Vec<bool>>,
    pub short_exits: Option<Vec<bool>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VolatilityClass {
    #[serde(rename = "Above Avg")]
    AboveAvg,
    #[serde(rename = "Below Avg")]
    BelowAvg,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrendClass {
    Bull,
    Sideways,
    Bear,
}

/// Regime classification for one daily timestamp
///
/// Classes are `None` and `regime_class` is 0 while the rolling windows are
/// still warming up.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeRecord {
    pub timestamp: DateTime<Utc>,
    pub volatility_ratio: Option<f64>,
    pub volatility_class: Option<VolatilityClass>,
    pub trend_class: Option<TrendClass>,
    pub regime_class: u8,
}

impl RegimeRecord {
    pub fn undetermined(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            volatility_ratio: None,
            volatility_class: None,
            trend_class: None,
            regime_class: 0,
        }
    }
}
