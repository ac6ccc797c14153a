//! File content repository.

use crate::error::MetadataResult;
use crate::models::{FileIndexRow, FileRow};
use async_trait::async_trait;

/// Repository for file records, their reference sets and per-revision names.
#[async_trait]
pub trait FileRepo: Send + Sync {
    async fn get_file(&self, file_hash: &str) -> MetadataResult<Option<FileRow>>;

    /// Record a stored blob and reference it from `pubkey_hash`, atomically.
    ///
    /// Keeps the existing file record if one is already present.
    async fn register_file(&self, file: &FileRow, pubkey_hash: &str) -> MetadataResult<()>;

    /// Add `pubkey_hash` to the reference set of `file_hash`.
    ///
    /// Returns false if it was already present.
    async fn add_file_reference(&self, file_hash: &str, pubkey_hash: &str)
    -> MetadataResult<bool>;

    async fn get_file_index(&self, file_hash: &str) -> MetadataResult<Option<FileIndexRow>>;

    /// Create or replace the filename shown for a revision.
    async fn upsert_file_name(&self, pubkey_hash: &str, file_name: &str) -> MetadataResult<()>;

    async fn get_file_name(&self, pubkey_hash: &str) -> MetadataResult<Option<String>>;
}
