use super::{with_equity, MarketData, SeriesSpec, Strategy, StrategyContext};
use crate::config::RsiDivergenceParams;
use crate::indicators::{
    atr_series, rolling_max, rolling_max_opt, rolling_min, rolling_min_opt, rsi_series,
};
use crate::models::{TradeDecision, TradeType, Triggers};
use anyhow::{Context, Result};

/// RSI divergence reversal strategy
///
/// Long entry on a new `lookback`-bar closing low while RSI is oversold but
/// above its own `lookback`-bar low (price makes a lower low, momentum does
/// not). Short entry is the mirror image at a closing high. There are no exit
/// triggers: positions are closed by the `close ± k·ATR` stops sent with the
/// entry.
pub struct RsiDivergenceStrategy {
    context: StrategyContext,
    params: RsiDivergenceParams,
    min_candles: usize,
}

impl RsiDivergenceStrategy {
    pub fn new(context: StrategyContext, params: RsiDivergenceParams, min_candles: usize) -> Self {
        Self {
            context,
            params,
            min_candles,
        }
    }

    fn triggers(&self, closes: &[f64], rsi: &[Option<f64>]) -> Triggers {
        let n = self.params.lookback;
        let close_low = rolling_min(closes, n);
        let close_high = rolling_max(closes, n);
        let rsi_low = rolling_min_opt(rsi, n);
        let rsi_high = rolling_max_opt(rsi, n);

        let bullish = (0..closes.len())
            .map(|i| match (close_low[i], rsi[i], rsi_low[i]) {
                (Some(low), Some(r), Some(r_low)) => {
                    closes[i] == low && r < self.params.oversold && r != r_low
                }
                _ => false,
            })
            .collect();

        let bearish = (0..closes.len())
            .map(|i| match (close_high[i], rsi[i], rsi_high[i]) {
                (Some(high), Some(r), Some(r_high)) => {
                    closes[i] == high && r > self.params.overbought && r != r_high
                }
                _ => false,
            })
            .collect();

        Triggers {
            long_entries: Some(bullish),
            short_entries: Some(bearish),
            ..Triggers::default()
        }
    }
}

impl Strategy for RsiDivergenceStrategy {
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
        let rsi = rsi_series(&closes, self.params.rsi_period);
        let mut decision = self.context.decide(self.triggers(&closes, &rsi), data)?;

        let offset = match decision.trade_type {
            Some(TradeType::EntryLong) => 1.0,
            Some(TradeType::EntryShort) => -1.0,
            _ => return Ok(with_equity(decision, self.params.perc_equity)),
        };

        let close = closes.last().copied().context("Empty trading window")?;
        let atr = atr_series(&data.trading, self.params.atr_period)
            .last()
            .copied()
            .flatten()
            .context("ATR undefined on the decision bar")?;
        let distance = self.params.atr_multiplier * atr;

        decision.sl_stop = Some(close - offset * distance);
        decision.tp_stop = Some(close + offset * distance);

        Ok(with_equity(decision, self.params.perc_equity))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::StrategyParams;
    use crate::models::Direction;
    use crate::strategy::build_strategy;

    fn create_test_params() -> RsiDivergenceParams {
        RsiDivergenceParams {
            bar_minutes: 60,
            number_of_candles: 51,
            rsi_period: 14,
            lookback: 25,
            oversold: 30.0,
            overbought: 70.0,
            atr_period: 14,
            atr_multiplier: 2.0,
            perc_equity: 1.0,
        }
    }

    /// Flat chop, a sharp crash, a bounce, then a slower slide to a matching low
    ///
    /// The slide reaches the crash low again at bar 44 with RSI near 25 while
    /// the crash itself pushed RSI under 13.
    fn create_test_closes() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..30).map(|i| if i % 2 == 1 { 100.5 } else { 100.0 }).collect();
        let mut x = 100.5;
        for _ in 0..5 {
            x -= 3.0;
            closes.push(x);
        }
        for _ in 0..4 {
            x += 1.5;
            closes.push(x);
        }
        for _ in 0..12 {
            x -= 1.0;
            closes.push(x);
        }
        closes
    }

    fn evaluate_at(strategy: &dyn Strategy, closes: &[f64], last: usize) -> TradeDecision {
        strategy
            .evaluate(&MarketData {
                trading: create_test_bars(60, &closes[..=last]),
                daily: None,
            })
            .unwrap()
    }

    #[test]
    fn test_bullish_divergence_entry_with_stops() {
        let strategy = build_strategy(&create_test_config(StrategyParams::RsiDivergence(
            create_test_params(),
        )));
        let closes = create_test_closes();

        assert_eq!(evaluate_at(strategy.as_ref(), &closes, 43).trade_type, None);

        let decision = evaluate_at(strategy.as_ref(), &closes, 44);
        assert_eq!(decision.trade_type, Some(TradeType::EntryLong));
        assert_eq!(decision.perc_equity, Some(1.0));

        let close = closes[44];
        let sl = decision.sl_stop.unwrap();
        let tp = decision.tp_stop.unwrap();
        assert!(sl < close && tp > close);
        assert!(((close - sl) - (tp - close)).abs() < 1e-9);

        // Still a divergence low on bar 45, suppressed as a repeat
        assert_eq!(evaluate_at(strategy.as_ref(), &closes, 45).trade_type, None);
    }

    #[test]
    fn test_bearish_divergence_mirrors_long() {
        let strategy = build_strategy(&create_test_config(StrategyParams::RsiDivergence(
            create_test_params(),
        )));
        let closes: Vec<f64> = create_test_closes().iter().map(|c| 200.0 - c).collect();

        let decision = evaluate_at(strategy.as_ref(), &closes, 44);
        assert_eq!(decision.trade_type, Some(TradeType::EntryShort));
        assert!(decision.sl_stop.unwrap() > closes[44]);
        assert!(decision.tp_stop.unwrap() < closes[44]);
    }

    #[test]
    fn test_long_only_ignores_bearish_divergence() {
        let mut config = create_test_config(StrategyParams::RsiDivergence(create_test_params()));
        config.directions = vec![Direction::Long];
        let strategy = build_strategy(&config);
        let closes: Vec<f64> = create_test_closes().iter().map(|c| 200.0 - c).collect();

        let decision = evaluate_at(strategy.as_ref(), &closes, 44);
        assert_eq!(decision.trade_type, None);
        assert_eq!(decision.sl_stop, None);
    }
}
