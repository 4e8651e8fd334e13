/// Query construction and execution
///
/// `Query` variants render to bound statements; `request` runs them through
/// an `Executor`, optionally short-circuiting through the on-disk cache.

pub mod catalog;
pub mod statement;

pub use catalog::{Query, DEFAULT_MISSING_THRESHOLD};
pub use statement::{Binding, Param, Statement};

use crate::cache::QueryCache;
use crate::db::Table;
use crate::error::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Anything that can run a bound statement and return its rows
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<Table>;
}

impl Query {
    /// Run the query, consulting `cache` first when one is given
    ///
    /// A cache hit never touches `executor`. On a miss the fresh result is
    /// written back; a failed write is logged and the result still returned.
    pub async fn request<E>(&self, executor: &E, cache: Option<&QueryCache>) -> Result<Table>
    where
        E: Executor + ?Sized,
    {
        let statement = self.statement();
        let text = statement.render();
        debug!(query = self.name(), sql = %text, "rendered query");

        if let Some(cache) = cache {
            match cache.read(&text).await {
                Ok(table) => return Ok(table),
                Err(e) if e.is_cache_miss() => {}
                Err(e) => return Err(e),
            }
        }

        let table = executor.execute(&statement).await?;

        if let Some(cache) = cache {
            if let Err(e) = cache.save(&text, &table).await {
                warn!(
                    query = self.name(),
                    error = %e,
                    "failed to cache query result"
                );
            }
        }

        Ok(table)
    }
}
