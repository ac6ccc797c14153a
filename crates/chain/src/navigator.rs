//! Read-only chain traversal over persisted revisions.
//!
//! Results are best-effort snapshots. A missing row ends the walk and the
//! partial chain is returned. At a branch the child with the lowest
//! pubkey hash is followed and a warning is logged; [`ChainNavigator::children_of`]
//! exposes every branch.

use crate::error::ChainResult;
use aqua_metadata::MetadataStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct ChainNavigator {
    store: Arc<dyn MetadataStore>,
}

impl ChainNavigator {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Owner-qualified hashes from `genesis_hash` forward to the tip.
    pub async fn order_from_genesis(&self, genesis_hash: &str) -> ChainResult<Vec<String>> {
        let mut ordered = vec![genesis_hash.to_string()];
        let mut seen = HashSet::from([genesis_hash.to_string()]);
        let mut current = genesis_hash.to_string();

        loop {
            let children = self.store.get_children(&current).await?;
            let Some(next) = children.first() else {
                break;
            };
            if children.len() > 1 {
                warn!(
                    pubkey_hash = %current,
                    branches = children.len(),
                    followed = %next.pubkey_hash,
                    "chain branches, following lowest hash"
                );
            }
            if !seen.insert(next.pubkey_hash.clone()) {
                warn!(pubkey_hash = %next.pubkey_hash, "cycle detected while ordering chain");
                break;
            }
            ordered.push(next.pubkey_hash.clone());
            current = next.pubkey_hash.clone();
        }

        Ok(ordered)
    }

    /// Owner-qualified hashes from the genesis to `tip_hash`, found by walking back.
    pub async fn order_from_latest(&self, tip_hash: &str) -> ChainResult<Vec<String>> {
        let mut reversed = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(tip_hash.to_string());

        while let Some(hash) = current.take() {
            if !seen.insert(hash.clone()) {
                warn!(pubkey_hash = %hash, "cycle detected while ordering chain");
                break;
            }
            let Some(revision) = self.store.get_revision(&hash).await? else {
                if !reversed.is_empty() {
                    warn!(pubkey_hash = %hash, "chain references a missing revision");
                }
                break;
            };
            reversed.push(hash);
            current = revision.previous.filter(|previous| !previous.is_empty());
        }

        reversed.reverse();
        Ok(reversed)
    }

    /// Every revision naming `pubkey_hash` as previous, ordered by hash.
    pub async fn children_of(&self, pubkey_hash: &str) -> ChainResult<Vec<String>> {
        Ok(self
            .store
            .get_children(pubkey_hash)
            .await?
            .into_iter()
            .map(|row| row.pubkey_hash)
            .collect())
    }
}
