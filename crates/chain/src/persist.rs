//! Persisting AquaTrees under an owner's namespace.

use crate::error::{ChainError, ChainResult};
use aqua_core::{AquaTree, FORM_FIELD_PREFIX, PubkeyHash, RevisionType, TreeRevision};
use aqua_metadata::EntityRecord;
use aqua_metadata::MetadataStore;
use aqua_metadata::models::{
    FormFieldRow, Json, LatestRow, LinkRow, RevisionRow, SignatureRow, WitnessEventRow,
    WitnessRow,
};
use aqua_metadata::repos::{NewRevision, PersistOutcome};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Workflow metadata for heads this save creates. An advanced head keeps its own.
#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    pub is_workflow: bool,
    pub template_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    /// Owner-qualified hashes written by this call.
    pub inserted: Vec<String>,
    /// Owner-qualified hashes that were already present.
    pub skipped: Vec<String>,
    /// Heads created or advanced, the saved tree's first.
    pub latest_hashes: Vec<String>,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Rows for one tree revision stored as `owner_hash`.
///
/// The tree's bare `previous` is qualified with the same owner.
pub(crate) fn new_revision(
    owner: &str,
    hash: &str,
    revision: &TreeRevision,
    file_name: Option<&str>,
) -> NewRevision {
    let pubkey_hash = PubkeyHash::new(owner, hash).to_string();
    let previous = (!revision.is_genesis())
        .then(|| PubkeyHash::new(owner, &revision.previous_verification_hash).to_string());

    let mut entity = None;
    let mut entity_key = None;
    let mut witness_event = None;
    match revision.revision_type {
        RevisionType::Signature => match &revision.signature {
            Some(signature) => {
                entity_key = Some(signature.clone());
                entity = Some(EntityRecord::Signature(SignatureRow {
                    content_key: signature.clone(),
                    signature_digest: signature.clone(),
                    signature_wallet_address: revision.signature_wallet_address.clone(),
                    signature_public_key: revision.signature_public_key.clone(),
                    signature_type: revision.signature_type.clone(),
                    reference_count: 1,
                }));
            }
            None => warn!(pubkey_hash, "signature revision carries no signature"),
        },
        RevisionType::Witness => {
            entity_key = Some(hash.to_string());
            entity = Some(EntityRecord::Witness(WitnessRow {
                content_key: hash.to_string(),
                merkle_root: revision.witness_merkle_root.clone(),
                reference_count: 1,
            }));
            witness_event = revision
                .witness_merkle_root
                .as_ref()
                .map(|merkle_root| WitnessEventRow {
                    merkle_root: merkle_root.clone(),
                    witness_timestamp: revision.witness_timestamp,
                    witness_network: revision.witness_network.clone(),
                    witness_smart_contract_address: revision
                        .witness_smart_contract_address
                        .clone(),
                    witness_transaction_hash: revision.witness_transaction_hash.clone(),
                    witness_sender_account_address: revision
                        .witness_sender_account_address
                        .clone(),
                });
        }
        RevisionType::Link => {
            entity_key = Some(hash.to_string());
            entity = Some(EntityRecord::Link(LinkRow {
                content_key: hash.to_string(),
                link_type: revision.link_type.clone(),
                link_require_indepth_verification: revision.link_require_indepth_verification,
                link_verification_hashes: Json(
                    revision.link_verification_hashes.clone().unwrap_or_default(),
                ),
                link_file_hashes: Json(revision.link_file_hashes.clone().unwrap_or_default()),
                reference_count: 1,
            }));
        }
        RevisionType::File | RevisionType::Form => {}
    }

    // Form revisions keep their fields in the forms table, everything else stays inline.
    let is_form = revision.revision_type == RevisionType::Form;
    let form_fields = if is_form {
        revision
            .form_fields()
            .map(|(key, value)| FormFieldRow {
                pubkey_hash: pubkey_hash.clone(),
                key: key.clone(),
                value: Json(value.clone()),
                value_type: json_type_name(value).to_string(),
            })
            .collect()
    } else {
        Vec::new()
    };
    let extra = revision
        .fields
        .iter()
        .filter(|(key, _)| !(is_form && key.starts_with(FORM_FIELD_PREFIX)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let carries_file = revision.revision_type.carries_file();
    let row = RevisionRow {
        pubkey_hash,
        owner: owner.to_string(),
        previous,
        nonce: revision.file_nonce.clone(),
        shared: Json(Vec::new()),
        contract: Json(Vec::new()),
        children: Json(Vec::new()),
        local_timestamp: revision.local_timestamp.clone(),
        revision_type: revision.revision_type.as_str().to_string(),
        version: revision.version.clone(),
        has_content: revision.content.is_some(),
        content: revision.content.clone(),
        verification_leaves: revision.leaves.clone().map(Json),
        file_hash: revision.file_hash.clone(),
        entity_key,
        extra: Json(extra),
        created_at: OffsetDateTime::now_utc(),
    };

    NewRevision {
        revision: row,
        entity,
        witness_event,
        form_fields,
        file_reference: revision.file_hash.clone().filter(|_| carries_file),
        file_name: file_name.filter(|_| carries_file).map(str::to_string),
    }
}

/// Persist every revision of `tree` (and its linked chains) under `owner`.
///
/// Revisions already present are skipped. The head for the chain moves from
/// the old tip to the new one, or is created if the chain had none.
pub async fn save_tree(
    store: &dyn MetadataStore,
    tree: &AquaTree,
    owner: &str,
    options: &SaveOptions,
) -> ChainResult<SaveReport> {
    let mut report = SaveReport::default();
    let mut visited = HashSet::new();
    save_tree_inner(store, tree, owner, options, &mut report, &mut visited).await?;
    info!(
        owner,
        inserted = report.inserted.len(),
        skipped = report.skipped.len(),
        "saved tree"
    );
    Ok(report)
}

fn save_tree_inner<'a>(
    store: &'a dyn MetadataStore,
    tree: &'a AquaTree,
    owner: &'a str,
    options: &'a SaveOptions,
    report: &'a mut SaveReport,
    visited: &'a mut HashSet<String>,
) -> BoxFuture<'a, ChainResult<()>> {
    async move {
        let tip = tree
            .tip_hash()
            .ok_or_else(|| ChainError::MalformedTree("tree has no revisions".to_string()))?;
        let ordered = tree.ordered_hashes();

        let mut previous_tip = None;
        for hash in ordered.iter().rev() {
            let qualified = PubkeyHash::new(owner, hash).to_string();
            if store.get_latest(&qualified).await?.is_some() {
                previous_tip = Some(qualified);
                break;
            }
        }

        for hash in &ordered {
            let Some(revision) = tree.revisions.get(hash) else {
                continue;
            };
            let new = new_revision(owner, hash, revision, tree.file_name_for(hash));
            let qualified = new.revision.pubkey_hash.clone();
            match store.persist_revision(&new).await? {
                PersistOutcome::Inserted => {
                    debug!(pubkey_hash = %qualified, "persisted revision");
                    report.inserted.push(qualified);
                }
                PersistOutcome::AlreadyExists => report.skipped.push(qualified),
            }
        }

        let latest = LatestRow {
            hash: PubkeyHash::new(owner, tip).to_string(),
            user: owner.to_string(),
            is_workflow: options.is_workflow,
            template_id: options.template_id.clone(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let latest = store
            .advance_latest(previous_tip.as_deref(), &latest)
            .await?;
        report.latest_hashes.push(latest.hash);

        for (linked_tip, linked) in &tree.linked_chains {
            if visited.insert(linked_tip.clone()) {
                save_tree_inner(store, linked, owner, &SaveOptions::default(), report, visited)
                    .await?;
            }
        }
        Ok(())
    }
    .boxed()
}
