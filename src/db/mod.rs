/// Database module for deddiag-loader
///
/// Handles all database access using Postgres and sqlx.
/// Implements connection pooling and result materialization.

pub mod connection;
pub mod models;
pub mod row;

pub use connection::{Connection, PoolStats, POOL_SIZE};
pub use models::*;
