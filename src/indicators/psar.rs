use crate::models::Bar;

/// Parabolic SAR output aligned with the input bars
///
/// Index 0 is always undefined: the trend is seeded on bar 1 by comparing the
/// first two closes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PsarSeries {
    pub sar: Vec<Option<f64>>,
    /// SAR projected onto the following bar
    pub next_bar: Vec<Option<f64>>,
    pub uptrend: Vec<Option<bool>>,
}

impl PsarSeries {
    pub fn len(&self) -> usize {
        self.sar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sar.is_empty()
    }
}

/// Run the PSAR recurrence
///
/// * `start` - initial (and post-reversal) acceleration factor
/// * `increment` - acceleration step on each new extreme point
/// * `maximum` - acceleration cap
///
/// The acceleration is not stepped on the bar a trend begins, and the SAR is
/// clamped so it never crosses the previous two bars' lows (uptrend) or highs
/// (downtrend).
pub fn compute_psar(bars: &[Bar], start: f64, increment: f64, maximum: f64) -> PsarSeries {
    let n = bars.len();
    let mut series = PsarSeries {
        sar: vec![None; n],
        next_bar: vec![None; n],
        uptrend: vec![None; n],
    };
    if n < 2 {
        return series;
    }

    let mut uptrend = false;
    let mut ep = 0.0;
    let mut af = start;
    let mut next_bar_sar = 0.0;

    for i in 1..n {
        let bar = &bars[i];
        let prev = &bars[i - 1];
        let mut first_trend_bar = false;
        let mut sar;

        if i == 1 {
            let (prev_sar, prev_ep) = if bar.close > prev.close {
                uptrend = true;
                ep = bar.high;
                (prev.low, bar.high)
            } else {
                uptrend = false;
                ep = bar.low;
                (prev.high, bar.low)
            };
            first_trend_bar = true;
            sar = prev_sar + start * (prev_ep - prev_sar);
        } else {
            sar = next_bar_sar;
        }

        // Reversal
        if uptrend {
            if sar > bar.low {
                first_trend_bar = true;
                uptrend = false;
                sar = ep.max(bar.high);
                ep = bar.low;
                af = start;
            }
        } else if sar < bar.high {
            first_trend_bar = true;
            uptrend = true;
            sar = ep.min(bar.low);
            ep = bar.high;
            af = start;
        }

        if !first_trend_bar {
            if uptrend && bar.high > ep {
                ep = bar.high;
                af = (af + increment).min(maximum);
            } else if !uptrend && bar.low < ep {
                ep = bar.low;
                af = (af + increment).min(maximum);
            }
        }

        if uptrend {
            sar = sar.min(prev.low);
            if i > 1 {
                sar = sar.min(bars[i - 2].low);
            }
        } else {
            sar = sar.max(prev.high);
            if i > 1 {
                sar = sar.max(bars[i - 2].high);
            }
        }

        next_bar_sar = sar + af * (ep - sar);

        series.sar[i] = Some(sar);
        series.next_bar[i] = Some(next_bar_sar);
        series.uptrend[i] = Some(uptrend);
    }

    series
}
