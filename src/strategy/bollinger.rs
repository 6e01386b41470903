use super::{with_equity, MarketData, SeriesSpec, Strategy, StrategyContext};
use crate::config::BollingerParams;
use crate::indicators::{calculate_bollinger, crossed_above, crossed_below, defined};
use crate::models::{TradeDecision, Triggers};
use anyhow::Result;

/// Bollinger band mean reversion
///
/// Enters when the close breaks out of a band and exits when it crosses back
/// over the middle band.
pub struct BollingerStrategy {
    context: StrategyContext,
    params: BollingerParams,
    min_candles: usize,
}

impl BollingerStrategy {
    pub fn new(context: StrategyContext, params: BollingerParams, min_candles: usize) -> Self {
        Self {
            context,
            params,
            min_candles,
        }
    }

    fn triggers(&self, closes: &[f64]) -> Triggers {
        let bands = calculate_bollinger(closes, self.params.period, self.params.std_dev);
        let close = defined(closes);

        Triggers {
            long_entries: Some(crossed_below(&close, &bands.lower)),
            long_exits: Some(crossed_above(&close, &bands.middle)),
            short_entries: Some(crossed_above(&close, &bands.upper)),
            short_exits: Some(crossed_below(&close, &bands.middle)),
        }
    }
}

impl Strategy for BollingerStrategy {
    fn name(&self) -> &str {
        &self.context.name
    }

    fn symbol(&self) -> &str {
        &self.context.symbol
    }

    fn trading_series(&self) -> SeriesSpec {
        self.context.trading
    }

    fn daily_series(&self) -> Option<SeriesSpec> {
        self.context.daily_series()
    }

    fn min_candles_required(&self) -> usize {
        self.min_candles
    }

    fn evaluate(&self, data: &MarketData) -> Result<TradeDecision> {
        self.context.ensure_enough(data, self.min_candles)?;

        let closes: Vec<f64> = data.trading.iter().map(|b| b.close).collect();
        let decision = self.context.decide(self.triggers(&closes), data)?;

        Ok(with_equity(decision, self.params.perc_equity))
    }
}
