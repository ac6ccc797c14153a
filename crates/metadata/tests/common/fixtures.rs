//! Row builders for metadata tests.

use aqua_core::RevisionType;
use aqua_metadata::EntityRecord;
use aqua_metadata::models::{LatestRow, RevisionRow, SignatureRow, WitnessRow};
use aqua_metadata::repos::NewRevision;
use sqlx::types::Json;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// A revision row for `owner_hash` with the given owner-qualified previous.
#[allow(dead_code)]
pub fn revision(owner: &str, hash: &str, previous: Option<&str>, ty: RevisionType) -> RevisionRow {
    RevisionRow {
        pubkey_hash: format!("{owner}_{hash}"),
        owner: owner.to_string(),
        previous: previous.map(str::to_string),
        nonce: None,
        shared: Json(Vec::new()),
        contract: Json(Vec::new()),
        children: Json(Vec::new()),
        local_timestamp: "20250101000000".to_string(),
        revision_type: ty.as_str().to_string(),
        version: String::new(),
        has_content: false,
        content: None,
        verification_leaves: None,
        file_hash: None,
        entity_key: None,
        extra: Json(BTreeMap::new()),
        created_at: OffsetDateTime::now_utc(),
    }
}

/// A bare revision with no references.
#[allow(dead_code)]
pub fn plain(revision: RevisionRow) -> NewRevision {
    NewRevision {
        revision,
        entity: None,
        witness_event: None,
        form_fields: Vec::new(),
        file_reference: None,
        file_name: None,
    }
}

/// A file genesis revision referencing `file_hash`.
#[allow(dead_code)]
pub fn file_genesis(owner: &str, hash: &str, file_hash: &str) -> NewRevision {
    let mut row = revision(owner, hash, None, RevisionType::File);
    row.file_hash = Some(file_hash.to_string());
    NewRevision {
        file_reference: Some(file_hash.to_string()),
        file_name: Some("hello.txt".to_string()),
        ..plain(row)
    }
}

/// A signature revision whose shared entity is keyed by `digest`.
#[allow(dead_code)]
pub fn signature_revision(owner: &str, hash: &str, previous: &str, digest: &str) -> NewRevision {
    let mut row = revision(owner, hash, Some(previous), RevisionType::Signature);
    row.entity_key = Some(digest.to_string());
    NewRevision {
        entity: Some(signature_record(digest)),
        ..plain(row)
    }
}

#[allow(dead_code)]
pub fn signature_record(digest: &str) -> EntityRecord {
    EntityRecord::Signature(SignatureRow {
        content_key: digest.to_string(),
        signature_digest: digest.to_string(),
        signature_wallet_address: Some("0xwallet".to_string()),
        signature_public_key: Some("0xpub".to_string()),
        signature_type: Some("ed25519".to_string()),
        reference_count: 1,
    })
}

#[allow(dead_code)]
pub fn witness_record(content_key: &str, merkle_root: &str) -> EntityRecord {
    EntityRecord::Witness(WitnessRow {
        content_key: content_key.to_string(),
        merkle_root: Some(merkle_root.to_string()),
        reference_count: 1,
    })
}

#[allow(dead_code)]
pub fn latest(hash: &str, user: &str) -> LatestRow {
    LatestRow {
        hash: hash.to_string(),
        user: user.to_string(),
        is_workflow: false,
        template_id: None,
        updated_at: OffsetDateTime::now_utc(),
    }
}
