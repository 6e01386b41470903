use crate::models::{Bar, TradeType, Triggers};
use crate::regime::{apply_regime_filter, regime_at, RegimeClassifier};
use anyhow::{Context, Result};

/// Regime gating applied before the final decision
pub struct RegimeGate {
    classifier: RegimeClassifier,
    allowed: Vec<u8>,
    ffill_entries: bool,
}

impl RegimeGate {
    pub fn new(allowed: Vec<u8>, ffill_entries: bool) -> Self {
        Self {
            classifier: RegimeClassifier::default(),
            allowed,
            ffill_entries,
        }
    }

    /// Filter `triggers` and report the regime class of the newest trading bar
    pub fn apply(&self, triggers: Triggers, trading: &[Bar], daily: &[Bar]) -> Result<(Triggers, u8)> {
        let grid = self.classifier.classify(daily, trading);
        let regimes: Vec<u8> = trading.iter().map(|b| regime_at(&grid, b.open_time)).collect();
        let current = regimes.last().copied().unwrap_or(0);

        let filtered = apply_regime_filter(triggers, &regimes, &self.allowed, self.ffill_entries)
            .context("Regime filter failed")?;

        Ok((filtered, current))
    }
}

/// Last value of a trigger series, suppressed when it repeats the bar before
///
/// A trigger that stays true across bars therefore fires once, on its first bar.
pub fn debounce(series: &[bool]) -> bool {
    match series {
        [.., prev, last] => *last && !*prev,
        [last] => *last,
        [] => false,
    }
}

/// Pick one instruction: Entry Long > Entry Short > Exit Long > Exit Short
pub fn select_trade_type(
    long_entry: bool,
    short_entry: bool,
    long_exit: bool,
    short_exit: bool,
) -> Option<TradeType> {
    if long_entry {
        Some(TradeType::EntryLong)
    } else if short_entry {
        Some(TradeType::EntryShort)
    } else if long_exit {
        Some(TradeType::ExitLong)
    } else if short_exit {
        Some(TradeType::ExitShort)
    } else {
        None
    }
}

/// Debounce every side of `triggers` and resolve precedence
pub fn resolve(triggers: &Triggers) -> Option<TradeType> {
    let last = |side: &Option<Vec<bool>>| side.as_deref().is_some_and(debounce);

    select_trade_type(
        last(&triggers.long_entries),
        last(&triggers.short_entries),
        last(&triggers.long_exits),
        last(&triggers.short_exits),
    )
}
