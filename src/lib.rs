/// deddiag-loader library
///
/// Query layer for the DEDDIAG energy-measurement dataset: pooled Postgres
/// access, bound dataset queries and an on-disk result cache.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod query;
pub mod report;

// Re-exports for convenience
pub use cache::QueryCache;
pub use config::DbConfig;
pub use db::{Connection, Table, Value};
pub use error::{DeddiagError, Result};
pub use query::{Executor, Query};
