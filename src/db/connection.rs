/// Database connection management with connection pooling
///
/// Provides a bounded, lazily filled pool of held-open Postgres connections.

use crate::config::DbConfig;
use crate::db::models::Table;
use crate::db::row;
use crate::error::Result;
use crate::query::{Executor, Statement};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{Executor as _, Postgres, Statement as _};
use tracing::debug;

/// Number of database connections in the pool
pub const POOL_SIZE: u32 = 5;

/// Pooled connection to one database target
#[derive(Clone)]
pub struct Connection {
    pool: PgPool,
}

impl Connection {
    /// Create a connection pool for `config`
    ///
    /// No connection is opened here; the first `execute` connects. Fails
    /// with `DeddiagError::Config` when `config` does not validate.
    ///
    /// # Examples
    /// ```no_run
    /// use deddiag_loader::{Connection, DbConfig};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let con = Connection::new(&DbConfig::default())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: &DbConfig) -> Result<Self> {
        config.validate()?;

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.db_name)
            .username(&config.user)
            .password(&config.password);

        Self::from_options(options, config)
    }

    /// Create a pool from prebuilt connect options, timeouts taken from `config`
    pub fn from_options(options: PgConnectOptions, config: &DbConfig) -> Result<Self> {
        let options = match config.statement_timeout {
            Some(timeout) => {
                options.options([("statement_timeout", timeout.as_millis().to_string())])
            }
            None => options,
        };

        // Connections stay open and are handed out again after release
        let pool = PgPoolOptions::new()
            .max_connections(POOL_SIZE)
            .min_connections(0)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Check out a connection, waiting while all `POOL_SIZE` are in use
    ///
    /// The connection goes back to the pool when the guard is dropped.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        let con = self.pool.acquire().await?;
        debug!(
            open = self.pool.size(),
            idle = self.pool.num_idle(),
            "acquired pooled connection"
        );
        Ok(con)
    }

    /// Run `statement` and materialize the full result set
    pub async fn execute(&self, statement: &Statement) -> Result<Table> {
        let mut con = self.acquire().await?;

        let types = statement.param_types();
        let prepared = (&mut *con).prepare_with(statement.sql(), &types).await?;
        let mut table = Table::new(row::describe(prepared.columns())?);

        let query = statement
            .bindings()
            .iter()
            .fold(prepared.query(), |query, binding| binding.value.bind(query));
        let rows = query.fetch_all(&mut *con).await?;

        table.rows = rows
            .iter()
            .map(|r| row::decode(r, &table.columns))
            .collect::<Result<_>>()?;

        debug!(rows = table.len(), "statement executed");
        Ok(table)
    }

    /// Get reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upper bound on simultaneously open connections
    pub fn max_connections(&self) -> u32 {
        self.pool.options().get_max_connections()
    }

    /// Close all connections in the pool
    ///
    /// Should be called on application shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            max_connections: self.max_connections(),
            open_connections: self.pool.size(),
            idle_connections: self.pool.num_idle(),
        }
    }
}

#[async_trait]
impl Executor for Connection {
    async fn execute(&self, statement: &Statement) -> Result<Table> {
        Connection::execute(self, statement).await
    }
}

/// Pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub max_connections: u32,
    pub open_connections: u32,
    pub idle_connections: usize,
}
