//! Shared entity repository.

use crate::entity_store::{AttachOutcome, DetachOutcome, EntityKind, EntityRecord};
use crate::error::MetadataResult;
use crate::models::{FormFieldRow, LinkRow, SignatureRow, WitnessEventRow, WitnessRow};
use async_trait::async_trait;

/// Repository for reference-counted entities and form fields.
///
/// `attach_entity` and `detach_entity` each run in their own transaction.
#[async_trait]
pub trait EntityRepo: Send + Sync {
    async fn get_signature(&self, content_key: &str) -> MetadataResult<Option<SignatureRow>>;

    async fn get_witness(&self, content_key: &str) -> MetadataResult<Option<WitnessRow>>;

    async fn get_witness_event(&self, merkle_root: &str)
    -> MetadataResult<Option<WitnessEventRow>>;

    async fn get_link(&self, content_key: &str) -> MetadataResult<Option<LinkRow>>;

    /// Form fields of one revision, ordered by key.
    async fn get_form_fields(&self, pubkey_hash: &str) -> MetadataResult<Vec<FormFieldRow>>;

    /// Current reference count, or `None` if the entity does not exist.
    async fn reference_count(
        &self,
        kind: EntityKind,
        content_key: &str,
    ) -> MetadataResult<Option<i64>>;

    /// Owner-qualified hashes referencing an entity, ordered.
    async fn entity_references(
        &self,
        kind: EntityKind,
        content_key: &str,
    ) -> MetadataResult<Vec<String>>;

    async fn attach_entity(
        &self,
        record: &EntityRecord,
        pubkey_hash: &str,
    ) -> MetadataResult<AttachOutcome>;

    async fn detach_entity(
        &self,
        kind: EntityKind,
        content_key: &str,
        pubkey_hash: &str,
    ) -> MetadataResult<DetachOutcome>;

    /// Insert the witness event unless one exists for its merkle root.
    async fn upsert_witness_event(&self, event: &WitnessEventRow) -> MetadataResult<()>;
}
