//! Materializing persisted chains back into [`AquaTree`]s.

use crate::error::{ChainError, ChainResult};
use aqua_core::{AquaTree, PubkeyHash, RevisionType, TreeRevision, bare_hash};
use aqua_metadata::MetadataStore;
use aqua_metadata::models::RevisionRow;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Rebuild the chain ending at `tip` (owner-qualified) from persisted rows.
///
/// Linked chains are resolved under the same owner first and fall back to
/// any owner holding the linked hash.
pub async fn fetch_chain(store: &dyn MetadataStore, tip: &str) -> ChainResult<AquaTree> {
    let mut visited = HashSet::new();
    fetch_chain_inner(store, tip.to_string(), &mut visited).await
}

fn fetch_chain_inner<'a>(
    store: &'a dyn MetadataStore,
    tip: String,
    visited: &'a mut HashSet<String>,
) -> BoxFuture<'a, ChainResult<AquaTree>> {
    async move {
        visited.insert(tip.clone());
        let Some(tip_row) = store.get_revision(&tip).await? else {
            return Err(ChainError::RevisionNotFound(tip));
        };

        let mut rows = vec![tip_row];
        let mut seen = HashSet::from([tip.clone()]);
        while let Some(previous) = rows
            .last()
            .and_then(|row| row.previous.clone())
            .filter(|p| !p.is_empty())
        {
            if !seen.insert(previous.clone()) {
                warn!(pubkey_hash = %previous, "cycle in previous links, stopping walk");
                break;
            }
            match store.get_revision(&previous).await? {
                Some(row) => rows.push(row),
                None => {
                    warn!(pubkey_hash = %previous, "previous revision missing, chain is partial");
                    break;
                }
            }
        }

        let mut tree = AquaTree::default();
        let mut linked_tips = Vec::new();
        for row in rows.iter().rev() {
            let revision = revision_from_row(store, row).await?;
            let hash = row.bare_hash().to_string();
            if let Some(name) = store.get_file_name(&row.pubkey_hash).await? {
                tree.file_index.insert(hash.clone(), name);
            }
            if revision.revision_type == RevisionType::Link {
                linked_tips.extend(
                    revision
                        .link_verification_hashes
                        .iter()
                        .flatten()
                        .map(|linked| (row.owner.clone(), linked.clone())),
                );
            }
            tree.revisions.insert(hash, revision);
        }

        for (owner, linked) in linked_tips {
            let Some(qualified) = resolve_linked(store, &owner, &linked).await? else {
                warn!(hash = %linked, "linked revision not found in any namespace");
                continue;
            };
            if visited.contains(&qualified) {
                continue;
            }
            let chain = fetch_chain_inner(store, qualified, visited).await?;
            tree.linked_chains.insert(linked, chain);
        }

        debug!(tip = %tip, revisions = tree.revisions.len(), "fetched chain");
        Ok(tree)
    }
    .boxed()
}

/// The owner-qualified hash a link target resolves to.
pub(crate) async fn resolve_linked(
    store: &dyn MetadataStore,
    owner: &str,
    linked: &str,
) -> ChainResult<Option<String>> {
    let bare = bare_hash(linked);
    let own = PubkeyHash::new(owner, bare).to_string();
    if store.revision_exists(&own).await? {
        return Ok(Some(own));
    }
    Ok(store
        .find_revisions_by_hash(bare)
        .await?
        .into_iter()
        .next()
        .map(|row| row.pubkey_hash))
}

/// Rebuild the tree-shaped revision from its row and entity records.
pub(crate) async fn revision_from_row(
    store: &dyn MetadataStore,
    row: &RevisionRow,
) -> ChainResult<TreeRevision> {
    let revision_type: RevisionType = row.revision_type.parse()?;
    let previous = row.previous.as_deref().map(bare_hash).unwrap_or_default();

    let mut revision = TreeRevision::new(revision_type, previous, row.local_timestamp.clone());
    revision.version = row.version.clone();
    revision.file_hash = row.file_hash.clone();
    revision.file_nonce = row.nonce.clone();
    revision.content = row.content.clone();
    revision.leaves = row.verification_leaves.as_ref().map(|leaves| leaves.0.clone());
    revision.fields = row.extra.0.clone();

    let key = row.entity_key.as_deref();
    match revision_type {
        RevisionType::Signature => {
            if let Some(signature) = match key {
                Some(key) => store.get_signature(key).await?,
                None => None,
            } {
                revision.signature = Some(signature.signature_digest);
                revision.signature_public_key = signature.signature_public_key;
                revision.signature_wallet_address = signature.signature_wallet_address;
                revision.signature_type = signature.signature_type;
            } else {
                warn!(pubkey_hash = %row.pubkey_hash, "signature entity missing");
            }
        }
        RevisionType::Witness => {
            let witness = match key {
                Some(key) => store.get_witness(key).await?,
                None => None,
            };
            match witness {
                Some(witness) => {
                    if let Some(root) = &witness.merkle_root
                        && let Some(event) = store.get_witness_event(root).await?
                    {
                        revision.witness_timestamp = event.witness_timestamp;
                        revision.witness_network = event.witness_network;
                        revision.witness_smart_contract_address =
                            event.witness_smart_contract_address;
                        revision.witness_transaction_hash = event.witness_transaction_hash;
                        revision.witness_sender_account_address =
                            event.witness_sender_account_address;
                    }
                    revision.witness_merkle_root = witness.merkle_root;
                }
                None => warn!(pubkey_hash = %row.pubkey_hash, "witness entity missing"),
            }
        }
        RevisionType::Link => {
            let link = match key {
                Some(key) => store.get_link(key).await?,
                None => None,
            };
            match link {
                Some(link) => {
                    revision.link_type = link.link_type;
                    revision.link_require_indepth_verification =
                        link.link_require_indepth_verification;
                    revision.link_verification_hashes = Some(link.link_verification_hashes.0);
                    revision.link_file_hashes = Some(link.link_file_hashes.0);
                }
                None => warn!(pubkey_hash = %row.pubkey_hash, "link entity missing"),
            }
        }
        RevisionType::Form => {
            for field in store.get_form_fields(&row.pubkey_hash).await? {
                revision.fields.insert(field.key, field.value.0);
            }
        }
        RevisionType::File => {}
    }

    Ok(revision)
}
