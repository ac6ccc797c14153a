use async_trait::async_trait;
use aqua_storage::error::{StorageError, StorageResult};
use aqua_storage::traits::{ObjectMeta, ObjectStore};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// In-memory object store standing in for a bucket.
///
/// Counts delete calls so tests can assert a blob was (or was not) removed.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    pub deletes: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().await.contains_key(key))
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let objects = self.objects.lock().await;
        let data = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectMeta {
            size: data.len() as u64,
            last_modified: None,
            content_type: None,
        })
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.objects
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.objects.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn put_if_not_exists(&self, key: &str, data: Bytes) -> StorageResult<bool> {
        let mut objects = self.objects.lock().await;
        if objects.contains_key(key) {
            return Ok(false);
        }
        objects.insert(key.to_string(), data);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
