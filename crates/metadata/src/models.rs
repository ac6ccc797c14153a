//! Database models mapping to the metadata schema.

use sqlx::FromRow;
pub use sqlx::types::Json;
use std::collections::BTreeMap;
use time::OffsetDateTime;

// =============================================================================
// Revisions
// =============================================================================

/// One persisted revision, keyed by its owner-qualified hash.
#[derive(Debug, Clone, FromRow)]
pub struct RevisionRow {
    pub pubkey_hash: String,
    pub owner: String,
    /// Owner-qualified hash of the prior revision. `None` for a genesis revision.
    pub previous: Option<String>,
    pub nonce: Option<String>,
    pub shared: Json<Vec<String>>,
    pub contract: Json<Vec<String>>,
    /// Owner-qualified hashes of revisions naming this one as previous.
    pub children: Json<Vec<String>>,
    pub local_timestamp: String,
    pub revision_type: String,
    pub version: String,
    pub has_content: bool,
    pub content: Option<String>,
    pub verification_leaves: Option<Json<Vec<String>>>,
    pub file_hash: Option<String>,
    /// Content key of the shared entity this revision references, if any.
    pub entity_key: Option<String>,
    /// Revision keys not covered by a dedicated column.
    pub extra: Json<BTreeMap<String, serde_json::Value>>,
    pub created_at: OffsetDateTime,
}

impl RevisionRow {
    /// The bare verification hash.
    pub fn bare_hash(&self) -> &str {
        aqua_core::bare_hash(&self.pubkey_hash)
    }

    pub fn is_genesis(&self) -> bool {
        self.previous.as_deref().is_none_or(str::is_empty)
    }
}

/// Current head of a chain as seen by one user.
#[derive(Debug, Clone, FromRow)]
pub struct LatestRow {
    pub hash: String,
    pub user: String,
    pub is_workflow: bool,
    pub template_id: Option<String>,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Files
// =============================================================================

/// Stored blob for a file content hash.
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    pub file_hash: String,
    /// Storage-location string naming the backend and key.
    pub file_location: String,
    pub file_size: Option<i64>,
    pub created_at: OffsetDateTime,
}

/// Reverse-reference set for a file content hash.
#[derive(Debug, Clone, FromRow)]
pub struct FileIndexRow {
    pub file_hash: String,
    pub pubkey_hashes: Json<Vec<String>>,
}

impl FileIndexRow {
    pub fn reference_count(&self) -> usize {
        self.pubkey_hashes.0.len()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FileNameRow {
    pub pubkey_hash: String,
    pub file_name: String,
}

// =============================================================================
// Shared entities
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct SignatureRow {
    /// The signature digest.
    pub content_key: String,
    pub signature_digest: String,
    pub signature_wallet_address: Option<String>,
    pub signature_public_key: Option<String>,
    pub signature_type: Option<String>,
    pub reference_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct WitnessRow {
    /// Bare hash of the witness revision.
    pub content_key: String,
    pub merkle_root: Option<String>,
    pub reference_count: i64,
}

/// Off-chain attestation data shared by every witness with the same merkle root.
#[derive(Debug, Clone, FromRow)]
pub struct WitnessEventRow {
    pub merkle_root: String,
    pub witness_timestamp: Option<i64>,
    pub witness_network: Option<String>,
    pub witness_smart_contract_address: Option<String>,
    pub witness_transaction_hash: Option<String>,
    pub witness_sender_account_address: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LinkRow {
    /// Bare hash of the link revision.
    pub content_key: String,
    pub link_type: Option<String>,
    pub link_require_indepth_verification: Option<bool>,
    pub link_verification_hashes: Json<Vec<String>>,
    pub link_file_hashes: Json<Vec<String>>,
    pub reference_count: i64,
}

/// One field of a form revision. Not shared across revisions.
#[derive(Debug, Clone, FromRow)]
pub struct FormFieldRow {
    pub pubkey_hash: String,
    pub key: String,
    pub value: Json<serde_json::Value>,
    #[sqlx(rename = "type")]
    pub value_type: String,
}
