//! Revision repository.

use crate::error::MetadataResult;
use crate::models::RevisionRow;
use async_trait::async_trait;

/// Read access to persisted revisions.
///
/// Writes go through [`ChainRepo`](super::ChainRepo) so that shared-entity
/// references stay in step with the revision rows.
#[async_trait]
pub trait RevisionRepo: Send + Sync {
    /// Get a revision by owner-qualified hash.
    async fn get_revision(&self, pubkey_hash: &str) -> MetadataResult<Option<RevisionRow>>;

    /// Check if a revision exists.
    async fn revision_exists(&self, pubkey_hash: &str) -> MetadataResult<bool>;

    /// Revisions whose previous is `pubkey_hash`, ordered by hash.
    async fn get_children(&self, pubkey_hash: &str) -> MetadataResult<Vec<RevisionRow>>;

    /// All revisions of one owner, ordered by hash.
    async fn list_revisions_by_owner(&self, owner: &str) -> MetadataResult<Vec<RevisionRow>>;

    /// Revisions of any owner whose bare hash is `hash`.
    async fn find_revisions_by_hash(&self, hash: &str) -> MetadataResult<Vec<RevisionRow>>;
}
