// Market data access: repository, freshness checks, resampling and the rolling window
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod resample;
pub mod staleness;
pub mod updater;
pub mod window;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::InMemoryBarRepository;
pub use postgres::{DatabaseClient, PostgresBarRepository};
pub use repository::BarRepository;
pub use resample::{aggregate, aggregate_from, resample};
pub use staleness::{is_stale, DEFAULT_STALE_THRESHOLD_SECS};
pub use updater::{base_duration, DataClient, UpdateOutcome};
pub use window::RollingWindow;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown data system: {0}")]
    UnknownSystem(String),

    #[error("Invalid bar table name: {0}")]
    InvalidTable(String),

    #[error("Data for {symbol} is stale (last close: {last_close:?})")]
    Stale {
        symbol: String,
        last_close: Option<DateTime<Utc>>,
    },

    #[error("Insufficient data for {symbol}: got {got} bars of {minutes}m, need {need}")]
    Insufficient {
        symbol: String,
        minutes: i64,
        got: usize,
        need: usize,
    },

    #[error("Resampling {symbol} to {minutes}m produced no complete bars")]
    EmptyResample { symbol: String, minutes: i64 },

    #[error("Repository error: {0}")]
    Repository(String),
}
