/// SMA for every bar; `None` until `period` values are available
pub fn sma_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 {
        return out;
    }

    let mut sum = 0.0;
    for i in 0..prices.len() {
        sum += prices[i];
        if i >= period {
            sum -= prices[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum / period as f64);
        }
    }

    out
}

/// EMA for every bar, seeded with the SMA of the first `period` values
pub fn ema_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Start with SMA
    let mut ema = prices[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);

    for i in period..prices.len() {
        ema = (prices[i] - ema) * multiplier + ema;
        out[i] = Some(ema);
    }

    out
}

/// EMA over a series with a leading undefined run (e.g. a MACD line)
///
/// Values after the first defined element are expected to stay defined.
pub fn ema_series_opt(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let Some(start) = values.iter().position(|v| v.is_some()) else {
        return vec![None; values.len()];
    };

    let defined: Vec<f64> = values[start..].iter().map_while(|v| *v).collect();

    let mut out = vec![None; start];
    out.extend(ema_series(&defined, period));
    out.resize(values.len(), None);
    out
}
