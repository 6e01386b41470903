use crate::models::Triggers;
use anyhow::{bail, Result};

/// Gate triggers by regime
///
/// `regimes[i]` is the regime class in force on trading bar `i`. Entries on a
/// bar whose regime is not in `allowed` are forced to false and exits are forced
/// to true, so positions are flattened while the market is out of favour.
///
/// With `ffill_entries`, an entry that lands on a disallowed bar is held and
/// fires on the next allowed bar instead of being dropped.
pub fn apply_regime_filter(
    triggers: Triggers,
    regimes: &[u8],
    allowed: &[u8],
    ffill_entries: bool,
) -> Result<Triggers> {
    if triggers.long_entries.is_none() && triggers.short_entries.is_none() {
        bail!("No long or short entries provided to the regime filter");
    }

    let is_allowed = |i: usize| regimes.get(i).is_some_and(|c| allowed.contains(c));

    let filter_entries = |entries: Vec<bool>| -> Vec<bool> {
        let mut pending = false;
        entries
            .iter()
            .enumerate()
            .map(|(i, &entry)| {
                if !ffill_entries {
                    return entry && is_allowed(i);
                }
                pending |= entry;
                if pending && is_allowed(i) {
                    pending = false;
                    true
                } else {
                    false
                }
            })
            .collect()
    };

    let filter_exits = |exits: Vec<bool>| -> Vec<bool> {
        exits
            .iter()
            .enumerate()
            .map(|(i, &exit)| exit || !is_allowed(i))
            .collect()
    };

    Ok(Triggers {
        long_entries: triggers.long_entries.map(&filter_entries),
        long_exits: triggers.long_exits.map(&filter_exits),
        short_entries: triggers.short_entries.map(&filter_entries),
        short_exits: triggers.short_exits.map(&filter_exits),
    })
}
