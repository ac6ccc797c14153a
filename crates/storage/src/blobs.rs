//! Routes blob reads and writes to the backend a location names.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::backends::filesystem::FilesystemBackend;
use crate::error::{StorageError, StorageResult};
use crate::location::BlobLocation;
use crate::traits::ObjectStore;

/// Blob store over an optional object-storage backend and an optional local root.
///
/// New blobs go to object storage when one is configured, otherwise to the
/// local root. Reads and deletes follow whatever the stored location says.
#[derive(Clone)]
pub struct BlobStore {
    object: Option<Arc<dyn ObjectStore>>,
    local: Option<Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("object", &self.object.as_ref().map(|s| s.backend_name()))
            .field("local", &self.local.as_ref().map(|s| s.backend_name()))
            .finish()
    }
}

impl BlobStore {
    /// Wrap a single backend. Filesystem backends serve local locations,
    /// everything else serves object locations.
    pub fn from_backend(store: Arc<dyn ObjectStore>) -> Self {
        if store.backend_name() == "filesystem" {
            Self {
                object: None,
                local: Some(store),
            }
        } else {
            Self {
                object: Some(store),
                local: None,
            }
        }
    }

    /// Add (or replace) the backend used for local locations.
    pub fn with_local(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.local = Some(store);
        self
    }

    /// Build from the primary storage config plus an optional local root.
    pub async fn from_config(
        config: &aqua_core::config::StorageConfig,
        local_root: Option<&Path>,
    ) -> StorageResult<Self> {
        let primary = crate::from_config(config).await?;
        let mut store = Self::from_backend(primary);
        if let Some(root) = local_root
            && store.local.is_none()
        {
            store = store.with_local(Arc::new(FilesystemBackend::new(root).await?));
        }
        Ok(store)
    }

    fn backend_for(&self, location: &BlobLocation) -> StorageResult<&Arc<dyn ObjectStore>> {
        match location {
            BlobLocation::Object(_) => self
                .object
                .as_ref()
                .ok_or(StorageError::BackendUnavailable("object")),
            BlobLocation::Local(_) => self
                .local
                .as_ref()
                .ok_or(StorageError::BackendUnavailable("local")),
        }
    }

    /// Store a blob under `key` and return its location.
    pub async fn put(&self, key: &str, data: Bytes) -> StorageResult<BlobLocation> {
        let location = match (&self.object, &self.local) {
            (Some(object), _) => {
                object.put(key, data).await?;
                BlobLocation::Object(key.to_string())
            }
            (None, Some(local)) => {
                local.put(key, data).await?;
                BlobLocation::Local(key.to_string())
            }
            (None, None) => return Err(StorageError::BackendUnavailable("blob")),
        };
        debug!(location = %location, "stored blob");
        Ok(location)
    }

    pub async fn get(&self, location: &BlobLocation) -> StorageResult<Bytes> {
        self.backend_for(location)?.get(location.key()).await
    }

    pub async fn exists(&self, location: &BlobLocation) -> StorageResult<bool> {
        self.backend_for(location)?.exists(location.key()).await
    }

    /// Delete the blob if it still exists. Returns whether anything was removed.
    pub async fn delete(&self, location: &BlobLocation) -> StorageResult<bool> {
        let backend = self.backend_for(location)?;
        if !backend.exists(location.key()).await? {
            warn!(location = %location, "blob already absent");
            return Ok(false);
        }
        match backend.delete(location.key()).await {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check every configured backend.
    pub async fn health_check(&self) -> StorageResult<()> {
        if let Some(object) = &self.object {
            object.health_check().await?;
        }
        if let Some(local) = &self.local {
            local.health_check().await?;
        }
        Ok(())
    }
}
