use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Indicator parameters, selected by the `type` tag of a strategy entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyParams {
    Psar(PsarParams),
    MaCrossover(MaCrossoverParams),
    Macd(MacdParams),
    RsiDivergence(RsiDivergenceParams),
    Bollinger(BollingerParams),
}

impl StrategyParams {
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyParams::Psar(_) => "psar",
            StrategyParams::MaCrossover(_) => "ma_crossover",
            StrategyParams::Macd(_) => "macd",
            StrategyParams::RsiDivergence(_) => "rsi_divergence",
            StrategyParams::Bollinger(_) => "bollinger",
        }
    }

    /// Duration of the bars the indicators run on
    pub fn bar_minutes(&self) -> i64 {
        match self {
            StrategyParams::Psar(p) => p.bar_minutes,
            StrategyParams::MaCrossover(p) => p.bar_minutes,
            StrategyParams::Macd(p) => p.bar_minutes,
            StrategyParams::RsiDivergence(p) => p.bar_minutes,
            StrategyParams::Bollinger(p) => p.bar_minutes,
        }
    }

    /// Size of the trading window
    pub fn number_of_candles(&self) -> usize {
        match self {
            StrategyParams::Psar(p) => p.number_of_candles,
            StrategyParams::MaCrossover(p) => p.number_of_candles,
            StrategyParams::Macd(p) => p.number_of_candles,
            StrategyParams::RsiDivergence(p) => p.number_of_candles,
            StrategyParams::Bollinger(p) => p.number_of_candles,
        }
    }

    /// Smallest window for which the last two decision bars are fully warmed up
    pub fn min_candles(&self) -> usize {
        match self {
            StrategyParams::Psar(p) => {
                let coarse = p
                    .psar_settings
                    .values()
                    .map(|s| s.shift_rows(p.bar_minutes) * 2)
                    .max()
                    .unwrap_or(0);
                (p.mt_len + 1)
                    .max(p.rolling_peak_valley_period)
                    .max(p.rolling_ret_period + 1)
                    .max(coarse)
                    + 1
            }
            StrategyParams::MaCrossover(p) => p.slow_period + 2,
            StrategyParams::Macd(p) => p.slow_period + p.signal_period + 1,
            StrategyParams::RsiDivergence(p) => {
                (p.rsi_period + p.lookback + 1).max(p.atr_period + 1)
            }
            StrategyParams::Bollinger(p) => p.period + 2,
        }
    }

    /// Check parameter ranges, returning a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        if self.bar_minutes() <= 0 {
            return Err(format!("bar_minutes must be positive, got {}", self.bar_minutes()));
        }

        let min = self.min_candles();
        if self.number_of_candles() < min {
            return Err(format!(
                "number_of_candles {} is too short, {} needs at least {}",
                self.number_of_candles(),
                self.kind(),
                min
            ));
        }

        match self {
            StrategyParams::Psar(p) => p.validate(),
            StrategyParams::MaCrossover(p) => {
                if p.fast_period == 0 || p.fast_period >= p.slow_period {
                    return Err(format!(
                        "fast_period {} must be positive and below slow_period {}",
                        p.fast_period, p.slow_period
                    ));
                }
                Ok(())
            }
            StrategyParams::Macd(p) => {
                if p.fast_period == 0 || p.signal_period == 0 || p.fast_period >= p.slow_period {
                    return Err(format!(
                        "MACD periods {}/{}/{} are invalid",
                        p.fast_period, p.slow_period, p.signal_period
                    ));
                }
                Ok(())
            }
            StrategyParams::RsiDivergence(p) => {
                if p.rsi_period == 0 || p.lookback == 0 || p.atr_period == 0 {
                    return Err("RSI divergence periods must be positive".to_string());
                }
                if p.oversold >= p.overbought {
                    return Err(format!(
                        "oversold {} must be below overbought {}",
                        p.oversold, p.overbought
                    ));
                }
                Ok(())
            }
            StrategyParams::Bollinger(p) => {
                if p.period < 2 || p.std_dev <= 0.0 {
                    return Err(format!(
                        "Bollinger period {} / std_dev {} are invalid",
                        p.period, p.std_dev
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Parabolic SAR recurrence settings and the coarse bucket they run on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PsarSettings {
    /// Coarse bucket size in hours
    #[serde(default = "default_psar_window")]
    pub window: i64,
    #[serde(default = "default_psar_step")]
    pub start: f64,
    #[serde(default = "default_psar_step")]
    pub increment: f64,
    #[serde(default = "default_psar_maximum")]
    pub maximum: f64,
}

impl PsarSettings {
    /// Fine bars per coarse bucket
    pub fn shift_rows(&self, fine_minutes: i64) -> usize {
        if fine_minutes <= 0 {
            return 0;
        }
        (self.window * 60 / fine_minutes).max(0) as usize
    }
}

impl Default for PsarSettings {
    fn default() -> Self {
        Self {
            window: default_psar_window(),
            start: default_psar_step(),
            increment: default_psar_step(),
            maximum: default_psar_maximum(),
        }
    }
}

/// Percent-of-equity sizes keyed by volatility condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TradeSizes {
    pub high_vol: f64,
    pub low_vol: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PsarParams {
    #[serde(default = "default_psar_bar_minutes")]
    pub bar_minutes: i64,
    #[serde(default = "default_psar_candles")]
    pub number_of_candles: usize,
    /// Rolling window (in bars) of the annualized volatility
    pub mt_len: usize,
    pub rolling_ret_period: usize,
    pub rolling_peak_valley_period: usize,
    pub rolling_ret_thresh: f64,
    pub peak_valley_chg_thresh: f64,
    pub vol_thresh: f64,
    /// Per-symbol settings; `default` is used for symbols without an entry
    pub psar_settings: HashMap<String, PsarSettings>,
    pub trade_sizes_long: TradeSizes,
    pub trade_sizes_short: TradeSizes,
}

impl PsarParams {
    /// Settings for `symbol`, falling back to `default`
    ///
    /// Keys are matched case-insensitively because the config loader
    /// lowercases table keys.
    pub fn settings_for(&self, symbol: &str) -> Option<&PsarSettings> {
        let lookup = |key: &str| {
            self.psar_settings
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        };
        lookup(symbol).or_else(|| lookup("default"))
    }

    fn validate(&self) -> Result<(), String> {
        if self.settings_for("default").is_none() {
            return Err("psar_settings must contain a `default` entry".to_string());
        }
        if self.mt_len < 2 || self.rolling_ret_period == 0 || self.rolling_peak_valley_period == 0 {
            return Err("PSAR rolling periods must be positive (mt_len >= 2)".to_string());
        }
        for (symbol, s) in &self.psar_settings {
            if s.window <= 0 || (s.window * 60) % self.bar_minutes != 0 {
                return Err(format!(
                    "PSAR window {}h for {} must be a positive multiple of {}m",
                    s.window, symbol, self.bar_minutes
                ));
            }
            if s.start <= 0.0 || s.increment < 0.0 || s.maximum < s.start {
                return Err(format!("PSAR acceleration settings for {} are invalid", symbol));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MaCrossoverParams {
    #[serde(default = "default_hourly")]
    pub bar_minutes: i64,
    #[serde(default = "default_ma_candles")]
    pub number_of_candles: usize,
    #[serde(default = "default_ma_fast")]
    pub fast_period: usize,
    #[serde(default = "default_ma_slow")]
    pub slow_period: usize,
    #[serde(default = "default_perc_equity")]
    pub perc_equity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MacdParams {
    #[serde(default = "default_hourly")]
    pub bar_minutes: i64,
    #[serde(default = "default_hourly_candles")]
    pub number_of_candles: usize,
    #[serde(default = "default_macd_fast")]
    pub fast_period: usize,
    #[serde(default = "default_macd_slow")]
    pub slow_period: usize,
    #[serde(default = "default_macd_signal")]
    pub signal_period: usize,
    #[serde(default = "default_perc_equity")]
    pub perc_equity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RsiDivergenceParams {
    #[serde(default = "default_hourly")]
    pub bar_minutes: i64,
    #[serde(default = "default_hourly_candles")]
    pub number_of_candles: usize,
    #[serde(default = "default_period_14")]
    pub rsi_period: usize,
    /// Bars in the rolling low/high the close and RSI are compared against
    #[serde(default = "default_divergence_lookback")]
    pub lookback: usize,
    #[serde(default = "default_oversold")]
    pub oversold: f64,
    #[serde(default = "default_overbought")]
    pub overbought: f64,
    #[serde(default = "default_period_14")]
    pub atr_period: usize,
    #[serde(default = "default_atr_multiplier")]
    pub atr_multiplier: f64,
    #[serde(default = "default_perc_equity")]
    pub perc_equity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BollingerParams {
    #[serde(default = "default_hourly")]
    pub bar_minutes: i64,
    #[serde(default = "default_hourly_candles")]
    pub number_of_candles: usize,
    #[serde(default = "default_bollinger_period")]
    pub period: usize,
    #[serde(default = "default_bollinger_std")]
    pub std_dev: f64,
    #[serde(default = "default_perc_equity")]
    pub perc_equity: f64,
}

fn default_psar_window() -> i64 {
    2
}
fn default_psar_step() -> f64 {
    0.02
}
fn default_psar_maximum() -> f64 {
    0.2
}
fn default_psar_bar_minutes() -> i64 {
    1
}
// 30 days of minute bars plus two decision bars
fn default_psar_candles() -> usize {
    43_202
}
fn default_hourly() -> i64 {
    60
}
fn default_hourly_candles() -> usize {
    55
}
fn default_ma_candles() -> usize {
    57
}
fn default_ma_fast() -> usize {
    10
}
fn default_ma_slow() -> usize {
    55
}
fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}
fn default_period_14() -> usize {
    14
}
fn default_divergence_lookback() -> usize {
    25
}
fn default_oversold() -> f64 {
    30.0
}
fn default_overbought() -> f64 {
    70.0
}
fn default_atr_multiplier() -> f64 {
    2.0
}
fn default_bollinger_period() -> usize {
    20
}
fn default_bollinger_std() -> f64 {
    2.0
}
fn default_perc_equity() -> f64 {
    1.0
}
