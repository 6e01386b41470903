// Trading strategy module
pub mod bollinger;
pub mod decision;
pub mod ma_crossover;
pub mod macd;
pub mod psar;
pub mod rsi_divergence;

pub use bollinger::BollingerStrategy;
pub use decision::{debounce, resolve, select_trade_type, RegimeGate};
pub use ma_crossover::MaCrossoverStrategy;
pub use macd::MacdStrategy;
pub use psar::PsarStrategy;
pub use rsi_divergence::RsiDivergenceStrategy;

use crate::config::{StrategyConfig, StrategyParams};
use crate::models::{Bar, Direction, TradeDecision, Triggers};
use anyhow::{bail, Result};
use std::sync::Arc;

/// Bar series a strategy needs kept up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSpec {
    pub minutes: i64,
    pub count: usize,
}

/// Snapshot of the rolling windows handed to one evaluation
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub trading: Vec<Bar>,
    pub daily: Option<Vec<Bar>>,
}

/// Base trait for all signal strategies
pub trait Strategy: Send + Sync {
    /// Get strategy name
    fn name(&self) -> &str;

    fn symbol(&self) -> &str;

    /// Series the decision runs on
    fn trading_series(&self) -> SeriesSpec;

    /// Daily series for regime classification, when regime gating is on
    fn daily_series(&self) -> Option<SeriesSpec>;

    /// Minimum trading bars required for a decision
    fn min_candles_required(&self) -> usize;

    /// Compute the decision for the newest trading bar
    fn evaluate(&self, data: &MarketData) -> Result<TradeDecision>;
}

/// Build the strategy selected by the config's `type` tag
pub fn build_strategy(config: &StrategyConfig) -> Arc<dyn Strategy> {
    let context = StrategyContext::from_config(config);
    let min_candles = config.params.min_candles();

    match &config.params {
        StrategyParams::Psar(p) => Arc::new(PsarStrategy::new(context, p.clone(), min_candles)),
        StrategyParams::MaCrossover(p) => {
            Arc::new(MaCrossoverStrategy::new(context, p.clone(), min_candles))
        }
        StrategyParams::Macd(p) => Arc::new(MacdStrategy::new(context, p.clone(), min_candles)),
        StrategyParams::RsiDivergence(p) => {
            Arc::new(RsiDivergenceStrategy::new(context, p.clone(), min_candles))
        }
        StrategyParams::Bollinger(p) => {
            Arc::new(BollingerStrategy::new(context, p.clone(), min_candles))
        }
    }
}

/// Settings shared by every strategy kind
pub struct StrategyContext {
    pub name: String,
    pub symbol: String,
    pub trading: SeriesSpec,
    directions: Vec<Direction>,
    gate: Option<RegimeGate>,
    daily_bars: usize,
}

impl StrategyContext {
    pub fn from_config(config: &StrategyConfig) -> Self {
        let gate = config
            .use_regime
            .then(|| RegimeGate::new(config.regime_classes.clone(), config.ffill_entries));

        Self {
            name: config.name.clone(),
            symbol: config.symbol.clone(),
            trading: SeriesSpec {
                minutes: config.params.bar_minutes(),
                count: config.params.number_of_candles(),
            },
            directions: config.directions.clone(),
            gate,
            daily_bars: config.daily_bars,
        }
    }

    pub fn allows(&self, direction: Direction) -> bool {
        self.directions.contains(&direction)
    }

    pub fn daily_series(&self) -> Option<SeriesSpec> {
        self.gate.as_ref().map(|_| SeriesSpec {
            minutes: 1440,
            count: self.daily_bars,
        })
    }

    pub fn ensure_enough(&self, data: &MarketData, min_candles: usize) -> Result<()> {
        if data.trading.len() < min_candles {
            bail!(
                "Insufficient data: {} candles, need {}",
                data.trading.len(),
                min_candles
            );
        }
        Ok(())
    }

    /// Drop the sides of directions this strategy does not trade
    pub fn mask(&self, triggers: Triggers) -> Triggers {
        let long = self.allows(Direction::Long);
        let short = self.allows(Direction::Short);

        Triggers {
            long_entries: triggers.long_entries.filter(|_| long),
            long_exits: triggers.long_exits.filter(|_| long),
            short_entries: triggers.short_entries.filter(|_| short),
            short_exits: triggers.short_exits.filter(|_| short),
        }
    }

    /// Apply the regime gate when configured
    ///
    /// Returns the (possibly filtered) triggers and the regime class of the
    /// newest trading bar, `None` when gating is off.
    pub fn gate(&self, triggers: Triggers, data: &MarketData) -> Result<(Triggers, Option<u8>)> {
        let Some(gate) = &self.gate else {
            return Ok((triggers, None));
        };
        let Some(daily) = data.daily.as_deref() else {
            bail!("Regime gating needs daily bars but none were provided");
        };

        let (filtered, current) = gate.apply(triggers, &data.trading, daily)?;
        Ok((filtered, Some(current)))
    }

    /// Mask, gate, debounce and resolve precedence in one pass
    pub fn decide(&self, triggers: Triggers, data: &MarketData) -> Result<TradeDecision> {
        let (triggers, current_regime_class) = self.gate(self.mask(triggers), data)?;

        Ok(TradeDecision {
            trade_type: resolve(&triggers),
            current_regime_class,
            bar_time: data.trading.last().map(|b| b.open_time),
            ..TradeDecision::none()
        })
    }
}

/// Entry size attached to instructions from the fixed-size strategies
pub(crate) fn with_equity(mut decision: TradeDecision, perc_equity: f64) -> TradeDecision {
    if decision.is_signal() {
        decision.perc_equity = Some(perc_equity);
    }
    decision
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::TradeType;

    #[test]
    fn test_build_strategy_uses_tagged_params() {
        let config = create_test_config(StrategyParams::MaCrossover(create_test_ma_params()));
        let strategy = build_strategy(&config);

        assert_eq!(strategy.name(), "test");
        assert_eq!(strategy.trading_series(), SeriesSpec { minutes: 60, count: 57 });
        assert_eq!(strategy.min_candles_required(), 57);
        assert!(strategy.daily_series().is_none());
    }

    #[test]
    fn test_daily_series_requested_with_regime() {
        let mut config = create_test_config(StrategyParams::MaCrossover(create_test_ma_params()));
        config.use_regime = true;
        let strategy = build_strategy(&config);

        assert_eq!(strategy.daily_series(), Some(SeriesSpec { minutes: 1440, count: 400 }));
    }

    #[test]
    fn test_mask_drops_untraded_direction() {
        let mut config = create_test_config(StrategyParams::MaCrossover(create_test_ma_params()));
        config.directions = vec![Direction::Short];
        let context = StrategyContext::from_config(&config);

        let masked = context.mask(Triggers {
            long_entries: Some(vec![true]),
            long_exits: Some(vec![false]),
            short_entries: Some(vec![false]),
            short_exits: Some(vec![true]),
        });
        assert_eq!(masked.long_entries, None);
        assert_eq!(masked.long_exits, None);
        assert_eq!(masked.short_exits, Some(vec![true]));
    }

    #[test]
    fn test_gate_requires_daily_bars() {
        let mut config = create_test_config(StrategyParams::MaCrossover(create_test_ma_params()));
        config.use_regime = true;
        let context = StrategyContext::from_config(&config);
        let data = MarketData {
            trading: create_test_bars(60, &[1.0, 2.0]),
            daily: None,
        };
        let triggers = Triggers {
            long_entries: Some(vec![false, true]),
            ..Triggers::default()
        };

        assert!(context.decide(triggers, &data).is_err());
    }

    #[test]
    fn test_regime_blocks_entry_and_reports_class() {
        let mut config = create_test_config(StrategyParams::MaCrossover(create_test_ma_params()));
        config.use_regime = true;
        config.regime_classes = vec![1];
        let context = StrategyContext::from_config(&config);

        // Too few daily bars to classify: every bar is regime 0
        let data = MarketData {
            trading: create_test_bars(60, &[1.0, 2.0]),
            daily: Some(create_test_bars(1440, &[1.0, 2.0, 3.0])),
        };
        let triggers = Triggers {
            long_entries: Some(vec![false, true]),
            long_exits: Some(vec![false, false]),
            ..Triggers::default()
        };
        let decision = context.decide(triggers, &data).unwrap();

        // Exits are forced on disallowed bars but stay true from the previous bar
        assert_eq!(decision.trade_type, None);
        assert_eq!(decision.current_regime_class, Some(0));
    }

    #[test]
    fn test_with_equity_only_on_signal() {
        let decision = with_equity(TradeDecision::none(), 1.0);
        assert_eq!(decision.perc_equity, None);

        let decision = with_equity(
            TradeDecision {
                trade_type: Some(TradeType::EntryLong),
                ..TradeDecision::none()
            },
            0.5,
        );
        assert_eq!(decision.perc_equity, Some(0.5));
    }
}
