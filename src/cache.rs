//! On-disk query result cache
//!
//! Entries live at `<cache_dir>/<sha256(query text)>.json` and are never
//! invalidated here: delete a file to force the query to run again.
//! Writers are not synchronized, the last write to a key wins.

use crate::db::Table;
use crate::error::{DeddiagError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::info;

const FILE_EXT: &str = "json";

/// Content-addressed result store rooted at one directory
#[derive(Debug, Clone)]
pub struct QueryCache {
    cache_dir: PathBuf,
}

impl QueryCache {
    /// The directory is created on first save, not here
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Hex SHA-256 digest of `query`
    pub fn hash(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Entry location for `query`
    pub fn file_path(&self, query: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", Self::hash(query), FILE_EXT))
    }

    /// Load the stored result for `query`
    ///
    /// Returns `DeddiagError::CacheMiss` when there is no entry file. Any
    /// other failure to inspect the entry is an I/O error.
    pub async fn read(&self, query: &str) -> Result<Table> {
        let path = self.file_path(query);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(DeddiagError::CacheMiss(path)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeddiagError::CacheMiss(path))
            }
            Err(err) => return Err(err.into()),
        }

        info!(path = %path.display(), "reading query from cache");
        let bytes = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Store `table` as the result of `query`, replacing any previous entry
    pub async fn save(&self, query: &str, table: &Table) -> Result<()> {
        let path = self.file_path(query);
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        info!(path = %path.display(), rows = table.len(), "caching query result");
        let bytes = serde_json::to_vec(table)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}
