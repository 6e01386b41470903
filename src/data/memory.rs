use super::{BarRepository, DataError};
use crate::models::Bar;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// In-memory bar store
///
/// Used for dry runs and tests. An optional visibility cutoff hides bars that
/// close after a given instant, which lets a caller replay a series one bar at
/// a time.
#[derive(Default)]
pub struct InMemoryBarRepository {
    series: RwLock<HashMap<(String, i64), Vec<Bar>>>,
    cutoff: RwLock<Option<DateTime<Utc>>>,
    pending_failures: AtomicUsize,
    fetches: AtomicUsize,
}

impl InMemoryBarRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bars of kind `<kind_minutes>m` for a symbol
    ///
    /// Bars with an open time already present are replaced.
    pub fn insert_bars(&self, symbol: &str, kind_minutes: i64, bars: Vec<Bar>) -> Result<(), String> {
        let mut series = self.series.write().map_err(|e| e.to_string())?;
        let stored = series
            .entry((symbol.to_string(), kind_minutes))
            .or_default();

        for bar in bars {
            match stored.iter_mut().find(|b| b.open_time == bar.open_time) {
                Some(existing) => *existing = bar,
                None => stored.push(bar),
            }
        }
        stored.sort_by_key(|b| b.open_time);

        Ok(())
    }

    /// Only serve bars closing at or before `cutoff`
    pub fn set_cutoff(&self, cutoff: Option<DateTime<Utc>>) -> Result<(), String> {
        let mut current = self.cutoff.write().map_err(|e| e.to_string())?;
        *current = cutoff;
        Ok(())
    }

    /// Make the next `count` fetches fail
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Number of fetches served so far (including failed ones)
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarRepository for InMemoryBarRepository {
    async fn fetch_latest(
        &self,
        symbol: &str,
        kind_minutes: i64,
        limit: usize,
    ) -> Result<Vec<Bar>, DataError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DataError::Repository("simulated fetch failure".to_string()));
        }

        let cutoff = *self
            .cutoff
            .read()
            .map_err(|e| DataError::Repository(e.to_string()))?;
        let series = self
            .series
            .read()
            .map_err(|e| DataError::Repository(e.to_string()))?;

        let Some(bars) = series.get(&(symbol.to_string(), kind_minutes)) else {
            return Ok(Vec::new());
        };

        let visible: Vec<&Bar> = bars
            .iter()
            .filter(|b| cutoff.map_or(true, |c| b.close_time <= c))
            .collect();
        let start = visible.len().saturating_sub(limit);

        Ok(visible[start..].iter().map(|b| (*b).clone()).collect())
    }
}
