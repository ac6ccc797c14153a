//! Chain Transfer Engine.
//!
//! Copies a chain from one owner's namespace into another's. Each revision is
//! keyed independently, so a transfer can be retried and converges: revisions
//! already present under the target are skipped. The engine is not atomic
//! end to end; every revision is persisted in its own short transaction.

use crate::error::{ChainError, ChainResult};
use crate::fetch::{fetch_chain, resolve_linked};
use aqua_core::{AquaTree, PubkeyHash, RevisionType, UNKNOWN_FILE_NAME, owner_prefix};
use aqua_metadata::models::{FormFieldRow, LatestRow, RevisionRow};
use aqua_metadata::repos::{NewRevision, PersistOutcome};
use aqua_metadata::{EntityKind, EntityRecord, MetadataStore};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// What happened to one revision during a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Copied,
    SkippedExists,
    SkippedMissing,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub source: String,
    pub target: String,
    pub outcome: TransferOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub success: bool,
    pub message: String,
    pub transferred_revisions: u64,
    pub linked_chains_transferred: u64,
    /// Target-side heads created by this transfer.
    pub latest_hashes: Vec<String>,
    pub items: Vec<TransferItem>,
}

#[derive(Default)]
struct TransferState {
    transferred: u64,
    linked: u64,
    latest_hashes: Vec<String>,
    items: Vec<TransferItem>,
    /// Bare tips of chains already handled.
    visited: HashSet<String>,
}

impl TransferState {
    fn record(&mut self, source: String, target: String, outcome: TransferOutcome) {
        debug!(%source, %target, ?outcome, "transfer item");
        if outcome == TransferOutcome::Copied {
            self.transferred += 1;
        }
        self.items.push(TransferItem {
            source,
            target,
            outcome,
        });
    }
}

#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn MetadataStore>,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Copy `chain` from `source_owner` into `target_owner`, following links.
    ///
    /// Never returns an error: failures are reported with `success = false`
    /// and the counts accumulated up to that point.
    pub async fn transfer_chain(
        &self,
        chain: &AquaTree,
        target_owner: &str,
        source_owner: &str,
    ) -> TransferResult {
        let mut state = TransferState::default();
        let outcome = self
            .transfer_inner(chain, target_owner, source_owner, true, &mut state)
            .await;

        let (success, message) = match outcome {
            Ok(()) => (
                true,
                format!(
                    "transferred {} revisions and {} linked chains",
                    state.transferred, state.linked
                ),
            ),
            Err(err) => {
                warn!(error = %err, source_owner, target_owner, "transfer aborted");
                (false, format!("transfer failed: {err}"))
            }
        };
        info!(
            source_owner,
            target_owner,
            success,
            transferred = state.transferred,
            linked = state.linked,
            "chain transfer finished"
        );

        TransferResult {
            success,
            message,
            transferred_revisions: state.transferred,
            linked_chains_transferred: state.linked,
            latest_hashes: state.latest_hashes,
            items: state.items,
        }
    }

    fn transfer_inner<'a>(
        &'a self,
        chain: &'a AquaTree,
        target_owner: &'a str,
        source_owner: &'a str,
        top_level: bool,
        state: &'a mut TransferState,
    ) -> BoxFuture<'a, ChainResult<()>> {
        async move {
            let tip = chain
                .tip_hash()
                .ok_or_else(|| ChainError::MalformedTree("chain has no revisions".to_string()))?
                .to_string();
            state.visited.insert(tip.clone());

            for hash in chain.ordered_hashes() {
                let source = PubkeyHash::new(source_owner, &hash).to_string();
                let target = PubkeyHash::new(target_owner, &hash).to_string();

                if self.store.revision_exists(&target).await? {
                    state.record(source.clone(), target, TransferOutcome::SkippedExists);
                    // A retry still has to reach chains behind an already copied link.
                    if let Some(row) = self.store.get_revision(&source).await?
                        && row.revision_type == "link"
                    {
                        self.transfer_links(chain, &hash, &row, target_owner, source_owner, state)
                            .await?;
                    }
                    continue;
                }
                let Some(row) = self.store.get_revision(&source).await? else {
                    warn!(pubkey_hash = %source, "source revision missing");
                    state.record(source, target, TransferOutcome::SkippedMissing);
                    continue;
                };

                let outcome = match self
                    .copy_revision(chain, &hash, &row, target_owner, source_owner)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        state.record(source, target, TransferOutcome::Failed(err.to_string()));
                        return Err(err);
                    }
                };
                state.record(source, target, outcome);
                if row.revision_type == "link" {
                    self.transfer_links(chain, &hash, &row, target_owner, source_owner, state)
                        .await?;
                }
            }

            self.create_target_latest(&tip, target_owner, source_owner, top_level, state)
                .await?;

            for (linked_tip, linked) in &chain.linked_chains {
                if state.visited.contains(linked_tip) {
                    continue;
                }
                let owner = self.linked_owner(source_owner, linked_tip).await?;
                self.transfer_inner(linked, target_owner, &owner, false, state)
                    .await?;
                state.linked += 1;
            }
            Ok(())
        }
        .boxed()
    }

    async fn copy_revision(
        &self,
        chain: &AquaTree,
        hash: &str,
        row: &RevisionRow,
        target_owner: &str,
        source_owner: &str,
    ) -> ChainResult<TransferOutcome> {
        let target = PubkeyHash::new(target_owner, hash).to_string();
        let revision_type: RevisionType = row.revision_type.parse()?;

        let source_prefix = owner_prefix(source_owner);
        let previous = row.previous.as_ref().map(|previous| {
            match previous.strip_prefix(&source_prefix) {
                Some(bare) => PubkeyHash::new(target_owner, bare).to_string(),
                None => previous.clone(),
            }
        });

        let (file_reference, file_name) = if revision_type.carries_file() {
            let Some(file_hash) = row.file_hash.clone() else {
                return Err(ChainError::MissingFileHash(row.pubkey_hash.clone()));
            };
            let name = match self.store.get_file_name(&row.pubkey_hash).await? {
                Some(name) => name,
                None => chain
                    .file_name_for(hash)
                    .unwrap_or(UNKNOWN_FILE_NAME)
                    .to_string(),
            };
            (Some(file_hash), Some(name))
        } else {
            (None, None)
        };

        let entity = match (EntityKind::for_revision_type(revision_type), &row.entity_key) {
            (Some(kind), Some(key)) => {
                let record = self.entity_record(kind, key).await?;
                if record.is_none() {
                    warn!(pubkey_hash = %row.pubkey_hash, %kind, content_key = %key, "shared entity missing");
                }
                record
            }
            _ => None,
        };

        let form_fields = self
            .store
            .get_form_fields(&row.pubkey_hash)
            .await?
            .into_iter()
            .map(|field| FormFieldRow {
                pubkey_hash: target.clone(),
                ..field
            })
            .collect();

        let new = NewRevision {
            revision: RevisionRow {
                pubkey_hash: target,
                owner: target_owner.to_string(),
                previous,
                children: Default::default(),
                created_at: OffsetDateTime::now_utc(),
                ..row.clone()
            },
            entity,
            witness_event: None,
            form_fields,
            file_reference,
            file_name,
        };

        Ok(match self.store.persist_revision(&new).await? {
            PersistOutcome::Inserted => TransferOutcome::Copied,
            PersistOutcome::AlreadyExists => TransferOutcome::SkippedExists,
        })
    }

    async fn entity_record(
        &self,
        kind: EntityKind,
        content_key: &str,
    ) -> ChainResult<Option<EntityRecord>> {
        Ok(match kind {
            EntityKind::Signature => self
                .store
                .get_signature(content_key)
                .await?
                .map(EntityRecord::Signature),
            EntityKind::Witness => self
                .store
                .get_witness(content_key)
                .await?
                .map(EntityRecord::Witness),
            EntityKind::Link => self
                .store
                .get_link(content_key)
                .await?
                .map(EntityRecord::Link),
        })
    }

    /// Transfer every chain a copied link revision points at.
    async fn transfer_links(
        &self,
        chain: &AquaTree,
        hash: &str,
        row: &RevisionRow,
        target_owner: &str,
        source_owner: &str,
        state: &mut TransferState,
    ) -> ChainResult<()> {
        let Some(link) = self.store.get_link(hash).await? else {
            return Ok(());
        };
        for linked_tip in link.link_verification_hashes.0 {
            if state.visited.contains(&linked_tip) {
                continue;
            }
            let Some(qualified) = resolve_linked(self.store.as_ref(), &row.owner, &linked_tip).await?
            else {
                warn!(hash = %linked_tip, "linked chain not found, skipping");
                continue;
            };
            let linked_owner = PubkeyHash::parse(&qualified)?.owner().to_string();
            let linked = match chain.linked_chains.get(&linked_tip) {
                Some(linked) => linked.clone(),
                None => fetch_chain(self.store.as_ref(), &qualified).await?,
            };
            debug!(source_owner, linked_owner, tip = %linked_tip, "following link");
            self.transfer_inner(&linked, target_owner, &linked_owner, false, state)
                .await?;
            state.linked += 1;
        }
        Ok(())
    }

    async fn linked_owner(&self, source_owner: &str, linked_tip: &str) -> ChainResult<String> {
        Ok(
            match resolve_linked(self.store.as_ref(), source_owner, linked_tip).await? {
                Some(qualified) => PubkeyHash::parse(&qualified)?.owner().to_string(),
                None => source_owner.to_string(),
            },
        )
    }

    /// Create the target's head for `tip`, carrying the source's workflow metadata.
    /// An existing target head is left as it is.
    async fn create_target_latest(
        &self,
        tip: &str,
        target_owner: &str,
        source_owner: &str,
        top_level: bool,
        state: &mut TransferState,
    ) -> ChainResult<()> {
        let source_tip = PubkeyHash::new(source_owner, tip).to_string();
        let source_latest = match self.store.get_latest(&source_tip).await? {
            Some(latest) => Some(latest),
            None => self.store.find_latest_by_hash(tip).await?,
        };
        let (is_workflow, template_id) = match source_latest {
            Some(latest) => (latest.is_workflow, latest.template_id),
            None if top_level => return Err(ChainError::LatestNotFound(source_tip)),
            None => {
                warn!(tip = %source_tip, "linked chain has no head, using defaults");
                (false, None)
            }
        };

        let target_tip = PubkeyHash::new(target_owner, tip).to_string();
        if !self.store.revision_exists(&target_tip).await? {
            warn!(tip = %target_tip, "target tip was not copied, leaving heads untouched");
            return Ok(());
        }
        let created = self
            .store
            .create_latest(&LatestRow {
                hash: target_tip.clone(),
                user: target_owner.to_string(),
                is_workflow,
                template_id,
                updated_at: OffsetDateTime::now_utc(),
            })
            .await?;
        if created {
            state.latest_hashes.push(target_tip);
        } else {
            debug!(tip = %target_tip, "target head already present");
        }
        Ok(())
    }
}
