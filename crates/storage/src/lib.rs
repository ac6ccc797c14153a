//! Blob storage for AquaTree file content.
//!
//! This crate provides:
//! - The `ObjectStore` trait with filesystem and S3-compatible backends
//! - `BlobLocation`, the stored location string naming a blob's backend
//! - `BlobStore`, which routes blob operations by location

pub mod backends;
pub mod blobs;
pub mod error;
pub mod location;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use blobs::BlobStore;
pub use error::{StorageError, StorageResult};
pub use location::BlobLocation;
pub use traits::{ObjectMeta, ObjectStore};

use aqua_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_from_config_filesystem() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig::Filesystem {
            path: dir.path().to_path_buf(),
        };
        let store = from_config(&config).await.unwrap();
        assert_eq!(store.backend_name(), "filesystem");
    }

    #[tokio::test]
    async fn test_from_config_rejects_partial_credentials() {
        let config = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("key".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        let Err(err) = from_config(&config).await else {
            panic!("expected a config error");
        };
        assert!(matches!(err, StorageError::Config(_)));
    }

    fn minio_config() -> StorageConfig {
        StorageConfig::S3 {
            bucket: "aqua-files".to_string(),
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            region: Some("us-east-1".to_string()),
            prefix: Some("blobs".to_string()),
            access_key_id: Some("minioadmin".to_string()),
            secret_access_key: Some("minioadmin".to_string()),
            force_path_style: true,
        }
    }

    #[tokio::test]
    async fn test_from_config_s3() {
        let store = from_config(&minio_config()).await.unwrap();
        assert_eq!(store.backend_name(), "s3");
    }

    #[tokio::test]
    async fn test_blob_store_routes_s3_with_local_root() {
        let dir = TempDir::new().unwrap();
        let blobs = BlobStore::from_config(&minio_config(), Some(dir.path()))
            .await
            .unwrap();
        let debug = format!("{blobs:?}");
        assert!(debug.contains("object: Some(\"s3\")"), "{debug}");
        assert!(debug.contains("local: Some(\"filesystem\")"), "{debug}");
    }
}
