//! Chain head repository.

use crate::error::MetadataResult;
use crate::models::LatestRow;
use async_trait::async_trait;

/// Repository for per-user chain heads.
#[async_trait]
pub trait LatestRepo: Send + Sync {
    /// Create or replace the head row at `latest.hash`.
    async fn upsert_latest(&self, latest: &LatestRow) -> MetadataResult<()>;

    /// Insert the head row unless one already exists at `latest.hash`.
    /// Returns whether a row was written.
    async fn create_latest(&self, latest: &LatestRow) -> MetadataResult<bool>;

    async fn get_latest(&self, hash: &str) -> MetadataResult<Option<LatestRow>>;

    /// First head (by hash) whose bare hash is `hash`, regardless of owner.
    async fn find_latest_by_hash(&self, hash: &str) -> MetadataResult<Option<LatestRow>>;

    /// Heads visible to `user`, ordered by hash.
    async fn list_latest(&self, user: &str) -> MetadataResult<Vec<LatestRow>>;

    /// Delete a head. Returns whether a row existed.
    async fn delete_latest(&self, hash: &str) -> MetadataResult<bool>;

    /// Move the head at `previous_tip` to `latest.hash`, keeping its workflow
    /// metadata. Inserts `latest` as given when no head exists at `previous_tip`.
    async fn advance_latest(
        &self,
        previous_tip: Option<&str>,
        latest: &LatestRow,
    ) -> MetadataResult<LatestRow>;
}
