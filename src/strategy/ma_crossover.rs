use super::{with_equity, MarketData, SeriesSpec, Strategy, StrategyContext};
use crate::config::MaCrossoverParams;
use crate::indicators::{crossed_above, crossed_below, sma_series};
use crate::models::{TradeDecision, Triggers};
use anyhow::Result;

/// Moving average crossover
///
/// Long entry (and short exit) when the fast SMA crosses above the slow SMA,
/// short entry (and long exit) when it crosses below.
pub struct MaCrossoverStrategy {
    context: StrategyContext,
    params: MaCrossoverParams,
    min_candles: usize,
}

impl MaCrossoverStrategy {
    pub fn new(context: StrategyContext, params: MaCrossoverParams, min_candles: usize) -> Self {
        Self {
            context,
            params,
            min_candles,
        }
    }

    fn triggers(&self, closes: &[f64]) -> Triggers {
        let fast = sma_series(closes, self.params.fast_period);
        let slow = sma_series(closes, self.params.slow_period);
        let bull = crossed_above(&fast, &slow);
        let bear = crossed_below(&fast, &slow);

        Triggers {
            long_entries: Some(bull.clone()),
            long_exits: Some(bear.clone()),
            short_entries: Some(bear),
            short_exits: Some(bull),
        }
    }
}

impl Strategy for MaCrossoverStrategy {
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
    use crate::models::{Direction, TradeType};
    use crate::strategy::build_strategy;

    /// Falling prices, then a jump at bar 60 that takes the fast SMA over the slow one
    fn create_test_closes(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| if i < 60 { 200.0 - i as f64 } else { 500.0 })
            .collect()
    }

    fn evaluate_at(strategy: &dyn Strategy, closes: &[f64], last: usize) -> TradeDecision {
        let data = MarketData {
            trading: create_test_bars(60, &closes[..=last]),
            daily: None,
        };
        strategy.evaluate(&data).unwrap()
    }

    #[test]
    fn test_entry_long_on_crossover_bar_only() {
        let strategy = build_strategy(&create_test_config(StrategyParams::MaCrossover(
            create_test_ma_params(),
        )));
        let closes = create_test_closes(62);

        assert_eq!(evaluate_at(strategy.as_ref(), &closes, 59).trade_type, None);

        let decision = evaluate_at(strategy.as_ref(), &closes, 60);
        assert_eq!(decision.trade_type, Some(TradeType::EntryLong));
        assert_eq!(decision.perc_equity, Some(1.0));
        assert_eq!(decision.bar_time, Some(start() + chrono::Duration::hours(60)));

        assert_eq!(evaluate_at(strategy.as_ref(), &closes, 61).trade_type, None);
    }

    #[test]
    fn test_bearish_cross_without_short_is_exit_long() {
        let mut config = create_test_config(StrategyParams::MaCrossover(create_test_ma_params()));
        config.directions = vec![Direction::Long];
        let strategy = build_strategy(&config);

        // Rising, then a collapse below the slow average
        let closes: Vec<f64> = (0..61)
            .map(|i| if i < 60 { 100.0 + 0.1 * i as f64 } else { 1.0 })
            .collect();
        let decision = evaluate_at(strategy.as_ref(), &closes, 60);

        assert_eq!(decision.trade_type, Some(TradeType::ExitLong));
    }

    #[test]
    fn test_insufficient_window_is_an_error() {
        let strategy = build_strategy(&create_test_config(StrategyParams::MaCrossover(
            create_test_ma_params(),
        )));
        let data = MarketData {
            trading: create_test_bars(60, &[1.0; 20]),
            daily: None,
        };

        assert!(strategy.evaluate(&data).is_err());
    }
}
