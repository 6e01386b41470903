//! Average True Range with Wilder smoothing
//!
//! The true range of a bar is the widest of its own high-low span and the gaps
//! from the previous close to its high and low.

use crate::models::Bar;

fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|pair| {
            let (prev, cur) = (&pair[0], &pair[1]);
            (cur.high - cur.low)
                .max((cur.high - prev.close).abs())
                .max((cur.low - prev.close).abs())
        })
        .collect()
}

/// ATR aligned with `bars`; the first value lands at index `period`
pub fn atr_series(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < period + 1 {
        return out;
    }

    let trs = true_ranges(bars);

    // Seeded with the plain mean of the first `period` ranges
    let mut atr: f64 = trs.iter().take(period).sum::<f64>() / period as f64;
    out[period] = Some(atr);

    for (i, tr) in trs.iter().enumerate().skip(period) {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        out[i + 1] = Some(atr);
    }

    out
}
