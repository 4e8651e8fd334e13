//! Connection configuration
//!
//! Resolved once by the caller (the CLI reads `DEDDIAG_DB_*` variables) and
//! handed to [`crate::db::Connection::new`]. Nothing in the library reads the
//! environment itself.

use crate::error::{DeddiagError, Result};
use std::time::Duration;

/// How long an acquire may wait for a connection before failing
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Database target and timeouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub db_name: String,
    pub user: String,
    pub password: String,
    /// Upper bound for connecting or waiting on a busy pool
    pub acquire_timeout: Duration,
    /// Server-side `statement_timeout` for every pooled connection
    pub statement_timeout: Option<Duration>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            db_name: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            statement_timeout: None,
        }
    }
}

impl DbConfig {
    /// Target `host:port/db_name` as `user`, every other field at its default
    pub fn new(
        host: impl Into<String>,
        port: u16,
        db_name: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            db_name: db_name.into(),
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Reject targets no connection attempt could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DeddiagError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(DeddiagError::Config("port must be between 1 and 65535".to_string()));
        }
        if self.db_name.trim().is_empty() {
            return Err(DeddiagError::Config("database name must not be empty".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(DeddiagError::Config("user must not be empty".to_string()));
        }
        if self.acquire_timeout.is_zero() {
            return Err(DeddiagError::Config("acquire timeout must be positive".to_string()));
        }
        if self.statement_timeout.is_some_and(|t| t.as_millis() == 0) {
            return Err(DeddiagError::Config(
                "statement timeout must be at least one millisecond".to_string(),
            ));
        }
        Ok(())
    }
}
