// Technical indicators module
// Implements SMA/EMA, RSI, ATR, MACD, Bollinger Bands and Parabolic SAR

pub mod atr;
pub mod bollinger;
pub mod crossover;
pub mod macd;
pub mod moving_average;
pub mod psar;
pub mod rsi;
pub mod stats;

pub use atr::atr_series;
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use crossover::{crossed_above, crossed_below, defined};
pub use macd::{calculate_macd, MacdSeries};
pub use moving_average::{ema_series, ema_series_opt, sma_series};
pub use psar::{compute_psar, PsarSeries};
pub use rsi::rsi_series;
pub use stats::{
    pct_change, rolling_max, rolling_max_opt, rolling_min, rolling_min_opt, rolling_std,
};
