//! Metadata store test utilities.

use aqua_metadata::{MetadataResult, MetadataStore, SqliteStore};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tempfile::TempDir;

/// A test metadata store wrapper that cleans up on drop.
#[allow(dead_code)]
pub struct TestMetadata {
    pub store: Arc<dyn MetadataStore>,
    pub(crate) sqlite_store: Arc<SqliteStore>,
    _temp_dir: Option<TempDir>,
}

#[allow(dead_code)]
impl TestMetadata {
    /// Create a file-backed SQLite store in a temporary directory.
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = Arc::new(SqliteStore::new(temp_dir.path().join("test.db")).await?);
        Ok(Self {
            store: store.clone(),
            sqlite_store: store,
            _temp_dir: Some(temp_dir),
        })
    }

    /// Create a new in-memory SQLite store (faster for tests).
    pub async fn in_memory() -> MetadataResult<Self> {
        let store = Arc::new(SqliteStore::new(":memory:").await?);
        Ok(Self {
            store: store.clone(),
            sqlite_store: store,
            _temp_dir: None,
        })
    }

    /// Get a reference to the metadata store.
    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    /// Get a reference to the SQLite connection pool for raw queries.
    pub fn pool(&self) -> &Pool<Sqlite> {
        self.sqlite_store.pool()
    }
}
