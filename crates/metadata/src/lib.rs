//! Relational store for AquaTree revision chains.
//!
//! This crate provides:
//! - Revisions keyed by owner-qualified hash, with parent/child links
//! - Per-user chain heads (`latest`)
//! - File records, their reverse-reference sets and per-revision filenames
//! - The reference-counted entity store for signatures, witnesses and links
//! - The atomic cascading deletion transaction

pub mod entity_store;
pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use entity_store::{AttachOutcome, DetachOutcome, EntityKind, EntityRecord, FileDetachOutcome};
pub use error::{DeletionFailure, MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};

use aqua_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_core::config::MetadataConfig;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("aquachain.db");
        let config = MetadataConfig::Sqlite {
            path: db_path.clone(),
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }
}
