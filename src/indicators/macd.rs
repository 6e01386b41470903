use super::moving_average::{ema_series, ema_series_opt};

/// MACD (Moving Average Convergence/Divergence) series
///
/// MACD line = EMA(fast) − EMA(slow), Signal = EMA(macd_line, signal_period).
/// Every vector is aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

/// Compute MACD over closes (oldest first)
///
/// The MACD line is defined from index `slow - 1` and the signal line from
/// `slow + signal - 2`.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);

    let macd: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let signal_line = ema_series_opt(&macd, signal);

    MacdSeries {
        macd,
        signal: signal_line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::crossed_above;

    #[test]
    fn test_macd_warmup() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let macd = calculate_macd(&closes, 12, 26, 9);

        assert_eq!(macd.macd[24], None);
        assert!(macd.macd[25].is_some());
        assert_eq!(macd.signal[32], None);
        assert!(macd.signal[33].is_some());
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let macd = calculate_macd(&closes, 12, 26, 9);

        assert!(macd.macd[59].unwrap() > 0.0);
    }

    #[test]
    fn test_macd_crosses_on_reversal() {
        // Accelerating decline keeps MACD under its signal, then a sharp rally
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 - 0.05 * (i * i) as f64).collect();
        closes.extend((1..=20).map(|i| 80.0 + i as f64 * 2.0));

        let macd = calculate_macd(&closes, 3, 6, 3);
        let bullish = crossed_above(&macd.macd, &macd.signal);

        assert!(macd.macd[19].unwrap() < macd.signal[19].unwrap());
        assert!(bullish[20..25].iter().any(|&b| b));
    }
}
