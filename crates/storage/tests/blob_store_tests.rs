//! Blob routing between object storage and the local root.

mod common;

use aqua_storage::{BlobLocation, BlobStore, FilesystemBackend, StorageError};
use bytes::Bytes;
use common::MemoryObjectStore;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_put_prefers_object_storage() {
    let object = MemoryObjectStore::new();
    let dir = TempDir::new().unwrap();
    let local = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
    let store = BlobStore::from_backend(object.clone()).with_local(local);

    let location = store
        .put("abc-hello.txt", Bytes::from_static(b"hello"))
        .await
        .unwrap();

    assert_eq!(location, BlobLocation::Object("abc-hello.txt".to_string()));
    assert_eq!(object.len().await, 1);
    assert!(!dir.path().join("abc-hello.txt").exists());
    assert_eq!(store.get(&location).await.unwrap(), Bytes::from_static(b"hello"));
}

#[tokio::test]
async fn test_filesystem_only_store_writes_local() {
    let dir = TempDir::new().unwrap();
    let local = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
    let store = BlobStore::from_backend(local);

    let location = store
        .put("abc-hello.txt", Bytes::from_static(b"hello"))
        .await
        .unwrap();

    assert_eq!(location.to_string(), "abc-hello.txt");
    assert!(dir.path().join("abc-hello.txt").exists());
    assert!(store.exists(&location).await.unwrap());
}

#[tokio::test]
async fn test_local_location_read_with_object_primary() {
    let object = MemoryObjectStore::new();
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("legacy.bin"), b"old bytes")
        .await
        .unwrap();
    let local = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
    let store = BlobStore::from_backend(object).with_local(local);

    let location = BlobLocation::parse("legacy.bin").unwrap();
    assert_eq!(
        store.get(&location).await.unwrap(),
        Bytes::from_static(b"old bytes")
    );
}

#[tokio::test]
async fn test_missing_backend_is_reported() {
    let object = MemoryObjectStore::new();
    let store = BlobStore::from_backend(object);

    let err = store
        .get(&BlobLocation::Local("x".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::BackendUnavailable("local")));
}

#[tokio::test]
async fn test_delete_is_tolerant_of_absent_blob() {
    let object = MemoryObjectStore::new();
    let store = BlobStore::from_backend(object.clone());

    let location = store
        .put("k", Bytes::from_static(b"v"))
        .await
        .unwrap();
    assert!(store.delete(&location).await.unwrap());
    assert!(!store.delete(&location).await.unwrap());
    assert_eq!(object.delete_count(), 1);
}
