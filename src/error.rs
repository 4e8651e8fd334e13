/// Error types for deddiag-loader
///
/// Every failure of the query layer is surfaced through `DeddiagError`.
/// Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for loader operations
#[derive(Error, Debug)]
pub enum DeddiagError {
    /// Database unreachable, authentication rejected or pool exhausted
    #[error("Connectivity error: {0}")]
    Connectivity(#[source] sqlx::Error),

    /// Statement rejected or failed on the server
    #[error("Query error: {0}")]
    Query(#[source] sqlx::Error),

    /// Result column whose Postgres type has no tabular mapping
    #[error("Unsupported type {type_name} for column {column}")]
    UnsupportedColumnType { column: String, type_name: String },

    /// No cache entry for the rendered query text
    #[error("Cache entry not found: {}", .0.display())]
    CacheMiss(PathBuf),

    /// I/O errors (cache files, exports)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Table cannot be written as a numeric array
    #[error("Export error: {0}")]
    Export(String),

    /// Result table is missing an expected column or value
    #[error("Report error: {0}")]
    Report(String),
}

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, DeddiagError>;

impl From<sqlx::Error> for DeddiagError {
    fn from(err: sqlx::Error) -> Self {
        if is_connectivity(&err) {
            DeddiagError::Connectivity(err)
        } else {
            DeddiagError::Query(err)
        }
    }
}

fn is_connectivity(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| is_connection_sqlstate(&code))
            .unwrap_or(false),
        _ => false,
    }
}

// Class 08 minus 08P01: a protocol violation comes from a bad bind, not the link.
// Class 28 is invalid authorization.
fn is_connection_sqlstate(code: &str) -> bool {
    matches!(code, "08000" | "08001" | "08003" | "08004" | "08006" | "08007")
        || code.starts_with("28")
}

/// Convert DeddiagError to a user-friendly error message
impl DeddiagError {
    pub fn user_message(&self) -> String {
        match self {
            DeddiagError::Connectivity(e) => {
                format!("Could not reach the database. Check host, port and credentials. Details: {}", e)
            }
            DeddiagError::Query(e) => {
                format!("The database rejected the query. Details: {}", e)
            }
            DeddiagError::UnsupportedColumnType { column, type_name } => {
                format!("Column '{}' has unsupported type {}", column, type_name)
            }
            DeddiagError::CacheMiss(path) => {
                format!("No cached result at {}", path.display())
            }
            DeddiagError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            DeddiagError::Serialization(e) => {
                format!("Cache file is unreadable, remove it to re-run the query. Details: {}", e)
            }
            DeddiagError::Config(msg) => format!("Configuration issue: {}", msg),
            DeddiagError::Export(msg) => format!("Export failed: {}", msg),
            DeddiagError::Report(msg) => format!("Report failed: {}", msg),
        }
    }

    /// True for the cache-miss condition `Query::request` recovers from
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, DeddiagError::CacheMiss(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_connectivity() {
        assert!(matches!(
            DeddiagError::from(sqlx::Error::PoolTimedOut),
            DeddiagError::Connectivity(_)
        ));
        assert!(matches!(
            DeddiagError::from(sqlx::Error::PoolClosed),
            DeddiagError::Connectivity(_)
        ));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            DeddiagError::from(sqlx::Error::Io(io)),
            DeddiagError::Connectivity(_)
        ));
    }

    #[test]
    fn test_other_driver_errors_are_query_errors() {
        assert!(matches!(
            DeddiagError::from(sqlx::Error::RowNotFound),
            DeddiagError::Query(_)
        ));
        assert!(matches!(
            DeddiagError::from(sqlx::Error::ColumnNotFound("min_date".to_string())),
            DeddiagError::Query(_)
        ));
    }

    #[test]
    fn test_connection_sqlstates() {
        for code in ["08000", "08001", "08003", "08004", "08006", "28000", "28P01"] {
            assert!(is_connection_sqlstate(code), "{} should be connectivity", code);
        }
        // protocol violation, invalid datetime format, syntax error
        for code in ["08P01", "22007", "42601", "57014"] {
            assert!(!is_connection_sqlstate(code), "{} should be a query error", code);
        }
    }

    #[test]
    fn test_error_user_messages() {
        let err = DeddiagError::UnsupportedColumnType {
            column: "price".to_string(),
            type_name: "NUMERIC".to_string(),
        };
        assert!(err.user_message().contains("price"));
        assert!(err.user_message().contains("NUMERIC"));

        let err = DeddiagError::CacheMiss(PathBuf::from("/tmp/cache/abc.json"));
        assert!(err.is_cache_miss());
        assert!(err.user_message().contains("abc.json"));
    }

    #[test]
    fn test_error_display() {
        let err = DeddiagError::Config("port must be numeric".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Configuration error"));
    }
}
