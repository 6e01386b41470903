fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// Relative Strength Index for every bar
///
/// Average gain and loss are simple means over the last `period` changes.
/// `None` until `period` price changes are available.
pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period + 1 {
        return out;
    }

    let mut gains = Vec::with_capacity(prices.len());
    let mut losses = Vec::with_capacity(prices.len());

    // Calculate price changes (index 0 has none)
    gains.push(0.0);
    losses.push(0.0);
    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut gain_sum: f64 = gains[1..=period].iter().sum();
    let mut loss_sum: f64 = losses[1..=period].iter().sum();
    out[period] = Some(rsi_from_averages(gain_sum / period as f64, loss_sum / period as f64));

    for i in (period + 1)..prices.len() {
        gain_sum += gains[i] - gains[i - period];
        loss_sum += losses[i] - losses[i - period];
        // Running sums can drift a hair below zero after long flat runs
        let avg_gain = gain_sum.max(0.0) / period as f64;
        let avg_loss = loss_sum.max(0.0) / period as f64;
        out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}
