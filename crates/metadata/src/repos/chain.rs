//! Multi-table chain mutations.

use crate::entity_store::EntityRecord;
use crate::error::{DeletionFailure, MetadataResult};
use crate::models::{FormFieldRow, RevisionRow, WitnessEventRow};
use async_trait::async_trait;
use serde::Serialize;

/// Everything needed to persist one revision and its references.
#[derive(Debug, Clone)]
pub struct NewRevision {
    pub revision: RevisionRow,
    /// Shared entity referenced by the revision.
    pub entity: Option<EntityRecord>,
    pub witness_event: Option<WitnessEventRow>,
    pub form_fields: Vec<FormFieldRow>,
    /// File content hash whose reference set gains this revision.
    pub file_reference: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted,
    /// A revision already exists at this hash. Nothing was written.
    AlreadyExists,
}

/// Rows removed from shared-entity tables during a deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedCounts {
    pub signatures: u64,
    pub links: u64,
    pub witnesses: u64,
    pub forms: u64,
    pub files: u64,
    pub file_indexes: u64,
}

/// Result of a committed deletion transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    /// Deleted revision hashes in deletion order.
    pub revisions: Vec<String>,
    pub related: RelatedCounts,
    /// Locations of blobs whose last reference was removed.
    pub blob_locations: Vec<String>,
    /// Latest rows moved to a previous revision.
    pub latest_repointed: u64,
    pub latest_removed: u64,
}

/// Chain mutations that must touch several tables at once.
#[async_trait]
pub trait ChainRepo: Send + Sync {
    /// Persist one revision in a single transaction.
    ///
    /// Inserts the row, registers it in the parent's children, attaches the
    /// shared entity, writes form fields, adds the file reference and sets
    /// the filename.
    async fn persist_revision(&self, revision: &NewRevision) -> MetadataResult<PersistOutcome>;

    /// Delete revisions in the given order inside one transaction.
    ///
    /// Callers pass descendants before their ancestors. Shared entities are
    /// detached and Latest rows repaired along the way. Either every row goes
    /// or none does.
    async fn delete_revisions(
        &self,
        leaf_first: &[String],
        delete_from_latest: bool,
    ) -> Result<DeletionSummary, DeletionFailure>;
}
