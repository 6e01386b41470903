use super::DataError;
use crate::models::Bar;
use async_trait::async_trait;

/// Source of truth for stored bars
///
/// Implementations return the `limit` most recent bars of kind `<kind_minutes>m`
/// for `symbol`, sorted oldest first.
#[async_trait]
pub trait BarRepository: Send + Sync {
    async fn fetch_latest(
        &self,
        symbol: &str,
        kind_minutes: i64,
        limit: usize,
    ) -> Result<Vec<Bar>, DataError>;
}
