use super::{with_equity, MarketData, SeriesSpec, Strategy, StrategyContext};
use crate::config::MacdParams;
use crate::indicators::{calculate_macd, crossed_above, crossed_below};
use crate::models::{TradeDecision, Triggers};
use anyhow::Result;

/// MACD line / signal line crossover
pub struct MacdStrategy {
    context: StrategyContext,
    params: MacdParams,
    min_candles: usize,
}

impl MacdStrategy {
    pub fn new(context: StrategyContext, params: MacdParams, min_candles: usize) -> Self {
        Self {
            context,
            params,
            min_candles,
        }
    }

    fn triggers(&self, closes: &[f64]) -> Triggers {
        let macd = calculate_macd(
            closes,
            self.params.fast_period,
            self.params.slow_period,
            self.params.signal_period,
        );
        let bull = crossed_above(&macd.macd, &macd.signal);
        let bear = crossed_below(&macd.macd, &macd.signal);

        Triggers {
            long_entries: Some(bull.clone()),
            long_exits: Some(bear.clone()),
            short_entries: Some(bear),
            short_exits: Some(bull),
        }
    }
}

impl Strategy for MacdStrategy {
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

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::StrategyParams;
    use crate::models::TradeType;
    use crate::strategy::build_strategy;

    fn create_test_params() -> MacdParams {
        MacdParams {
            bar_minutes: 60,
            number_of_candles: 40,
            fast_period: 3,
            slow_period: 6,
            signal_period: 3,
            perc_equity: 0.5,
        }
    }

    /// Accelerating decline, then a steady rally from bar 20
    fn create_test_closes() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 - 0.05 * (i * i) as f64).collect();
        closes.extend((1..=20).map(|i| 80.0 + i as f64 * 2.0));
        closes
    }

    #[test]
    fn test_entry_long_when_macd_crosses_signal() {
        let strategy = build_strategy(&create_test_config(StrategyParams::Macd(create_test_params())));
        let closes = create_test_closes();

        let at = |last: usize| {
            strategy
                .evaluate(&MarketData {
                    trading: create_test_bars(60, &closes[..=last]),
                    daily: None,
                })
                .unwrap()
        };

        assert_eq!(at(19).trade_type, None);
        let decision = at(20);
        assert_eq!(decision.trade_type, Some(TradeType::EntryLong));
        assert_eq!(decision.perc_equity, Some(0.5));
        assert_eq!(at(21).trade_type, None);
    }

    #[test]
    fn test_min_candles_covers_signal_warmup() {
        let strategy = build_strategy(&create_test_config(StrategyParams::Macd(create_test_params())));
        assert_eq!(strategy.min_candles_required(), 10);

        let data = MarketData {
            trading: create_test_bars(60, &create_test_closes()[..9]),
            daily: None,
        };
        assert!(strategy.evaluate(&data).is_err());
    }
}
