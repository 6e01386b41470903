use super::moving_average::sma_series;
use super::stats::rolling_std;

/// Bollinger Bands aligned with the input closes
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// middle = SMA(period), upper/lower = middle ± std_dev × sample std(period)
pub fn calculate_bollinger(closes: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let middle = sma_series(closes, period);
    let values: Vec<Option<f64>> = closes.iter().map(|c| Some(*c)).collect();
    let std = rolling_std(&values, period);

    let band = |sign: f64| -> Vec<Option<f64>> {
        middle
            .iter()
            .zip(&std)
            .map(|(m, s)| Some((*m)? + sign * std_dev * (*s)?))
            .collect()
    };

    BollingerBands {
        upper: band(1.0),
        lower: band(-1.0),
        middle,
    }
}
