use super::{BarRepository, DataError};
use crate::config::SystemConfig;
use crate::models::Bar;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

struct SystemHandle {
    db_url: String,
    max_connections: u32,
    pool: Mutex<Option<PgPool>>,
}

/// Per-system Postgres connections
///
/// A pool is created the first time a system is used and health-checked with
/// `SELECT 1` before every reuse. A dead pool is dropped and rebuilt rather
/// than retried in place.
pub struct DatabaseClient {
    systems: HashMap<String, SystemHandle>,
}

impl DatabaseClient {
    /// Register every system that has a `db_url`
    pub fn new(systems: &[SystemConfig]) -> Self {
        let systems = systems
            .iter()
            .filter_map(|s| {
                s.db_url.as_ref().map(|url| {
                    (
                        s.name.clone(),
                        SystemHandle {
                            db_url: url.clone(),
                            max_connections: s.max_connections,
                            pool: Mutex::new(None),
                        },
                    )
                })
            })
            .collect();

        tracing::info!("Initialized DB connection registry");

        Self { systems }
    }

    /// Get a live pool for a system, creating or recreating it if needed
    pub async fn get_pool(&self, system: &str) -> Result<PgPool, DataError> {
        let handle = self
            .systems
            .get(system)
            .ok_or_else(|| DataError::UnknownSystem(system.to_string()))?;

        let mut guard = handle.pool.lock().await;

        if let Some(pool) = guard.as_ref() {
            if Self::is_alive(pool).await {
                return Ok(pool.clone());
            }
            tracing::warn!("Connection to {} is dead, recreating", system);
            *guard = None;
        }

        let pool = PgPoolOptions::new()
            .max_connections(handle.max_connections)
            .connect(&handle.db_url)
            .await?;

        tracing::info!("Connected to Postgres for system {}", system);

        *guard = Some(pool.clone());
        Ok(pool)
    }

    async fn is_alive(pool: &PgPool) -> bool {
        sqlx::query("SELECT 1").execute(pool).await.is_ok()
    }
}

/// Bar repository backed by a Postgres candle table
pub struct PostgresBarRepository {
    client: Arc<DatabaseClient>,
    system: String,
    table: String,
}

impl PostgresBarRepository {
    pub fn new(client: Arc<DatabaseClient>, system: &str, table: &str) -> Result<Self, DataError> {
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid {
            return Err(DataError::InvalidTable(table.to_string()));
        }

        Ok(Self {
            client,
            system: system.to_string(),
            table: table.to_string(),
        })
    }

    fn row_to_bar(row: &PgRow, kind_minutes: i64) -> Result<Bar, DataError> {
        let close_time: DateTime<Utc> = match row.try_get::<DateTime<Utc>, _>("close_datetime") {
            Ok(t) => t,
            Err(_) => row.try_get::<NaiveDateTime, _>("close_datetime")?.and_utc(),
        };

        Ok(Bar::from_close(
            close_time,
            kind_minutes,
            row.try_get("open")?,
            row.try_get("high")?,
            row.try_get("low")?,
            row.try_get("close")?,
            row.try_get::<Option<f64>, _>("volume").ok().flatten(),
        ))
    }
}

#[async_trait]
impl BarRepository for PostgresBarRepository {
    async fn fetch_latest(
        &self,
        symbol: &str,
        kind_minutes: i64,
        limit: usize,
    ) -> Result<Vec<Bar>, DataError> {
        let pool = self.client.get_pool(&self.system).await?;

        // Returned to the pool when dropped, on success and on every error path
        let mut conn = pool.acquire().await?;

        let query = format!(
            "SELECT * FROM {} WHERE symbol = $1 AND kind = $2 ORDER BY close_datetime DESC LIMIT $3",
            self.table
        );

        let rows = sqlx::query(&query)
            .bind(symbol)
            .bind(format!("{}m", kind_minutes))
            .bind(limit as i64)
            .fetch_all(&mut *conn)
            .await?;

        let mut bars = rows
            .iter()
            .map(|row| Self::row_to_bar(row, kind_minutes))
            .collect::<Result<Vec<_>, _>>()?;
        bars.sort_by_key(|b| b.close_time);

        tracing::debug!(
            "Fetched {} {}m bars for {} from {}",
            bars.len(),
            kind_minutes,
            symbol,
            self.system
        );

        Ok(bars)
    }
}
