//! Chain Deletion Engine.
//!
//! Deletion runs in two phases. Discovery walks `previous` links forward from
//! the target outside any transaction and records revisions root first. The
//! store then deletes that list in reverse, children before parents, inside
//! one transaction. Blobs whose last file reference went away are removed
//! only after the transaction commits.

use crate::error::ChainResult;
use aqua_core::PubkeyHash;
use aqua_metadata::MetadataStore;
use aqua_metadata::repos::{DeletionSummary, RelatedCounts};
use aqua_storage::{BlobLocation, BlobStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionDetails {
    /// Owner-qualified hashes removed, deepest first.
    pub revisions: Vec<String>,
    pub related: RelatedCounts,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionResult {
    pub success: bool,
    pub deleted: u64,
    pub details: DeletionDetails,
    pub message: String,
}

impl DeletionResult {
    fn from_summary(success: bool, summary: DeletionSummary, message: String) -> Self {
        Self {
            success,
            deleted: summary.revisions.len() as u64,
            details: DeletionDetails {
                revisions: summary.revisions,
                related: summary.related,
            },
            message,
        }
    }
}

#[derive(Clone)]
pub struct DeletionEngine {
    store: Arc<dyn MetadataStore>,
    blobs: BlobStore,
}

impl DeletionEngine {
    pub fn new(store: Arc<dyn MetadataStore>, blobs: BlobStore) -> Self {
        Self { store, blobs }
    }

    /// Revisions to delete for `root`, root first.
    ///
    /// Every hash appears once even if the stored graph has a cycle.
    pub async fn discover(&self, root: &str) -> ChainResult<Vec<String>> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root.to_string()];

        while let Some(hash) = stack.pop() {
            if !seen.insert(hash.clone()) {
                continue;
            }
            let children = self.store.get_children(&hash).await?;
            ordered.push(hash);
            stack.extend(children.into_iter().rev().map(|child| child.pubkey_hash));
        }
        Ok(ordered)
    }

    /// Delete `revision_hash` and every revision descending from it.
    ///
    /// A bare hash is qualified with `owner` when one is given. The result is
    /// all-or-nothing: `success == false` means no row was removed.
    pub async fn delete_chain(
        &self,
        revision_hash: &str,
        owner: Option<&str>,
        delete_from_latest: bool,
    ) -> DeletionResult {
        let root = match owner {
            Some(owner) => PubkeyHash::qualify(revision_hash, owner).to_string(),
            None => revision_hash.to_string(),
        };
        info!(root = %root, delete_from_latest, "starting chain deletion");

        let exists = match self.store.revision_exists(&root).await {
            Ok(exists) => exists,
            Err(err) => {
                error!(root = %root, error = %err, "failed to look up revision");
                return DeletionResult::from_summary(
                    false,
                    DeletionSummary::default(),
                    format!("lookup failed: {err}"),
                );
            }
        };
        if !exists {
            warn!(root = %root, "revision to delete not found");
            return DeletionResult::from_summary(
                false,
                DeletionSummary::default(),
                format!("revision not found: {root}"),
            );
        }

        let ordered = match self.discover(&root).await {
            Ok(ordered) => ordered,
            Err(err) => {
                error!(root = %root, error = %err, "discovery failed");
                return DeletionResult::from_summary(
                    false,
                    DeletionSummary::default(),
                    format!("discovery failed: {err}"),
                );
            }
        };
        debug!(root = %root, count = ordered.len(), "collected revisions to delete");

        let leaf_first: Vec<String> = ordered.into_iter().rev().collect();
        let summary = match self
            .store
            .delete_revisions(&leaf_first, delete_from_latest)
            .await
        {
            Ok(summary) => summary,
            Err(failure) => {
                error!(root = %root, error = %failure, "deletion rolled back");
                let message = failure.to_string();
                return DeletionResult::from_summary(false, failure.partial, message);
            }
        };

        let removed_blobs = self.remove_blobs(&summary.blob_locations).await;
        info!(
            root = %root,
            revisions = summary.revisions.len(),
            signatures = summary.related.signatures,
            links = summary.related.links,
            witnesses = summary.related.witnesses,
            forms = summary.related.forms,
            files = summary.related.files,
            file_indexes = summary.related.file_indexes,
            latest_repointed = summary.latest_repointed,
            latest_removed = summary.latest_removed,
            removed_blobs,
            "chain deleted"
        );

        let message = format!("deleted {} revisions", summary.revisions.len());
        DeletionResult::from_summary(true, summary, message)
    }

    async fn remove_blobs(&self, locations: &[String]) -> usize {
        let mut removed = 0;
        for raw in locations {
            let location = match BlobLocation::parse(raw) {
                Ok(location) => location,
                Err(err) => {
                    warn!(location = %raw, error = %err, "unreadable blob location");
                    continue;
                }
            };
            match self.blobs.delete(&location).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => warn!(location = %location, error = %err, "failed to remove blob"),
            }
        }
        removed
    }
}
