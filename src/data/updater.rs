use super::{is_stale, resample, BarRepository, DataError, RollingWindow};
use crate::models::Bar;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of "now" for freshness checks
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Stored bar duration used to build a requested duration
///
/// Multiples of 30 minutes are built from `30m` bars, everything else from
/// `1m` bars.
pub fn base_duration(requested_minutes: i64) -> i64 {
    if requested_minutes % 30 == 0 {
        30
    } else {
        1
    }
}

fn base_ratio(requested_minutes: i64) -> usize {
    (requested_minutes / base_duration(requested_minutes)).max(1) as usize
}

/// Result of one incremental update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub stale: bool,
    pub updated: bool,
}

/// Fetches bars for one strategy and keeps its rolling windows current
pub struct DataClient {
    repository: Arc<dyn BarRepository>,
    stale_threshold_secs: i64,
    clock: Clock,
    last_update_time: Option<DateTime<Utc>>,
}

impl DataClient {
    pub fn new(repository: Arc<dyn BarRepository>, stale_threshold_secs: i64) -> Self {
        Self::with_clock(repository, stale_threshold_secs, Arc::new(Utc::now))
    }

    pub fn with_clock(
        repository: Arc<dyn BarRepository>,
        stale_threshold_secs: i64,
        clock: Clock,
    ) -> Self {
        Self {
            repository,
            stale_threshold_secs,
            clock,
            last_update_time: None,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Time of the last successful historical load or update
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.last_update_time
    }

    /// Load the newest `count` complete bars of `minutes` duration
    ///
    /// Fetches `ratio * count + ratio` base bars so the leading partial bucket
    /// can be trimmed without coming up short.
    pub async fn get_historical_data(
        &mut self,
        symbol: &str,
        minutes: i64,
        count: usize,
    ) -> Result<Vec<Bar>, DataError> {
        let base = base_duration(minutes);
        let ratio = base_ratio(minutes);
        let limit = ratio * count + ratio;

        let raw = self.repository.fetch_latest(symbol, base, limit).await?;

        if is_stale(&raw, base, self.now(), self.stale_threshold_secs) {
            return Err(DataError::Stale {
                symbol: symbol.to_string(),
                last_close: raw.iter().map(|b| b.close_time).max(),
            });
        }

        let mut bars = resample(&raw, base, minutes);
        if bars.is_empty() {
            return Err(DataError::EmptyResample {
                symbol: symbol.to_string(),
                minutes,
            });
        }
        if bars.len() < count {
            return Err(DataError::Insufficient {
                symbol: symbol.to_string(),
                minutes,
                got: bars.len(),
                need: count,
            });
        }

        let excess = bars.len() - count;
        bars.drain(..excess);

        tracing::info!(
            "✓ Loaded {} {}m bars for {} (last close {})",
            bars.len(),
            minutes,
            symbol,
            bars.last().map(|b| b.close_time.to_rfc3339()).unwrap_or_default()
        );

        self.last_update_time = Some(self.now());
        Ok(bars)
    }

    /// Pull the newest complete bar and append it to `window` if it is new
    ///
    /// Never fails: fetch errors are logged and reported as "not stale, not
    /// updated" with the window left untouched.
    pub async fn update_candles(
        &mut self,
        symbol: &str,
        window: &mut RollingWindow,
        minutes: i64,
    ) -> UpdateOutcome {
        match self.try_update(symbol, window, minutes).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("✗ Update of {} {}m failed: {}", symbol, minutes, e);
                UpdateOutcome::default()
            }
        }
    }

    async fn try_update(
        &mut self,
        symbol: &str,
        window: &mut RollingWindow,
        minutes: i64,
    ) -> Result<UpdateOutcome, DataError> {
        let base = base_duration(minutes);
        let raw = self
            .repository
            .fetch_latest(symbol, base, base_ratio(minutes))
            .await?;

        if is_stale(&raw, base, self.now(), self.stale_threshold_secs) {
            return Ok(UpdateOutcome {
                stale: true,
                updated: false,
            });
        }

        let Some(latest) = resample(&raw, base, minutes).pop() else {
            // Newest bucket not complete yet
            return Ok(UpdateOutcome::default());
        };

        let updated = match window.last() {
            Some(last) if *last == latest => false,
            Some(last) if last.open_time == latest.open_time => {
                tracing::info!("Revised {}m bar for {} at {}", minutes, symbol, latest.open_time);
                window.replace_last(latest);
                true
            }
            Some(last) if latest.open_time < last.open_time => {
                tracing::debug!("Ignoring out-of-order {}m bar for {}", minutes, symbol);
                false
            }
            _ => {
                tracing::info!(
                    "Added {}m bar for {}: close {} at {}",
                    minutes,
                    symbol,
                    latest.close,
                    latest.close_time
                );
                window.push(latest);
                true
            }
        };

        if updated {
            self.last_update_time = Some(self.now());
        }

        Ok(UpdateOutcome {
            stale: false,
            updated,
        })
    }
}
