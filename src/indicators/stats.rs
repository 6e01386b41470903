//! Rolling statistics over price and return series
//!
//! Every series function returns one value per input element; `None` marks
//! positions where the window is not yet full or contains an undefined value.

use std::collections::VecDeque;

/// Fractional change over `periods` elements: `x[i] / x[i - periods] - 1`
pub fn pct_change(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            if periods == 0 || i < periods {
                return None;
            }
            let prev = values[i - periods];
            if prev == 0.0 {
                None
            } else {
                Some(x / prev - 1.0)
            }
        })
        .collect()
}

/// Rolling sample standard deviation (n - 1 denominator)
///
/// Runs in O(n) using running sums, so it stays cheap for month-long windows of
/// minute data.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window < 2 {
        return out;
    }

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut missing = 0usize;

    for i in 0..values.len() {
        match values[i] {
            Some(v) => {
                sum += v;
                sum_sq += v * v;
            }
            None => missing += 1,
        }

        if i >= window {
            match values[i - window] {
                Some(v) => {
                    sum -= v;
                    sum_sq -= v * v;
                }
                None => missing -= 1,
            }
        }

        if i + 1 >= window && missing == 0 {
            let n = window as f64;
            let variance = ((sum_sq - sum * sum / n) / (n - 1.0)).max(0.0);
            out[i] = Some(variance.sqrt());
        }
    }

    out
}

fn rolling_extreme(values: &[f64], window: usize, keep: impl Fn(f64, f64) -> bool) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }

    // Indices whose values are monotonic under `keep`, front is the extreme
    let mut candidates: VecDeque<usize> = VecDeque::new();

    for (i, &v) in values.iter().enumerate() {
        while candidates.back().is_some_and(|&j| !keep(values[j], v)) {
            candidates.pop_back();
        }
        candidates.push_back(i);

        while candidates.front().is_some_and(|&j| j + window <= i) {
            candidates.pop_front();
        }

        if i + 1 >= window {
            out[i] = candidates.front().map(|&j| values[j]);
        }
    }

    out
}

/// Rolling maximum over `window` elements
pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_extreme(values, window, |kept, new| kept > new)
}

/// Rolling minimum over `window` elements
pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_extreme(values, window, |kept, new| kept < new)
}

/// Rolling minimum over a series with gaps (undefined while any value is missing)
pub fn rolling_min_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_opt(values, window, rolling_min)
}

/// Rolling maximum over a series with gaps (undefined while any value is missing)
pub fn rolling_max_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_opt(values, window, rolling_max)
}

fn rolling_opt(
    values: &[Option<f64>],
    window: usize,
    f: fn(&[f64], usize) -> Vec<Option<f64>>,
) -> Vec<Option<f64>> {
    let filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    let mut out = f(&filled, window);

    let mut last_missing: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_none() {
            last_missing = Some(i);
        }
        if last_missing.is_some_and(|m| m + window > i) {
            out[i] = None;
        }
    }

    out
}
