//! Facade over the chain operations, wired from configuration.

use crate::authz;
use crate::deletion::{DeletionEngine, DeletionResult};
use crate::error::{ChainError, ChainResult};
use crate::fetch;
use crate::genesis::GenesisAssembler;
use crate::navigator::ChainNavigator;
use crate::persist::{self, SaveOptions, SaveReport};
use crate::transfer::{TransferEngine, TransferResult};
use crate::verifier::{LocalVerifier, LogData, TreeVerifier};
use aqua_core::config::{AppConfig, GenesisConfig};
use aqua_core::{AquaTree, FileObject, GenesisContent, PubkeyHash};
use aqua_metadata::MetadataStore;
use aqua_metadata::models::LatestRow;
use aqua_signer::RevisionSigner;
use aqua_storage::BlobStore;
use std::sync::Arc;
use tracing::info;

/// `tree` minus its linked chains, which stay in their own namespaces.
fn without_links(tree: &AquaTree) -> AquaTree {
    AquaTree {
        revisions: tree.revisions.clone(),
        file_index: tree.file_index.clone(),
        linked_chains: Default::default(),
    }
}

#[derive(Clone)]
pub struct AquaChainService {
    store: Arc<dyn MetadataStore>,
    blobs: BlobStore,
    verifier: Arc<dyn TreeVerifier>,
    signer: Option<Arc<RevisionSigner>>,
    navigator: ChainNavigator,
    transfer: TransferEngine,
    deletion: DeletionEngine,
    genesis: GenesisAssembler,
}

impl AquaChainService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: BlobStore,
        verifier: Arc<dyn TreeVerifier>,
        signer: Option<RevisionSigner>,
        genesis: GenesisConfig,
    ) -> Self {
        let signer = signer.map(Arc::new);
        Self {
            navigator: ChainNavigator::new(store.clone()),
            transfer: TransferEngine::new(store.clone()),
            deletion: DeletionEngine::new(store.clone(), blobs.clone()),
            genesis: GenesisAssembler::new(
                store.clone(),
                blobs.clone(),
                verifier.clone(),
                signer.clone(),
                genesis,
            ),
            store,
            blobs,
            verifier,
            signer,
        }
    }

    /// Open the configured stores and use the in-process verifier.
    pub async fn from_config(config: &AppConfig, signer: Option<RevisionSigner>) -> ChainResult<Self> {
        config.validate().map_err(ChainError::Config)?;
        let store = aqua_metadata::from_config(&config.metadata).await?;
        let blobs = BlobStore::from_config(&config.storage, config.local_storage.as_deref()).await?;
        info!(blobs = ?blobs, signing = signer.is_some(), "chain service ready");
        Ok(Self::new(
            store,
            blobs,
            Arc::new(LocalVerifier::new()),
            signer,
            config.genesis.clone(),
        ))
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn navigator(&self) -> &ChainNavigator {
        &self.navigator
    }

    pub async fn create_genesis_tree(
        &self,
        owner: &str,
        content: GenesisContent,
        file_name: &str,
    ) -> ChainResult<(AquaTree, FileObject)> {
        self.genesis
            .create_genesis_tree(owner, content, file_name)
            .await
    }

    pub async fn transfer_chain(
        &self,
        chain: &AquaTree,
        target_owner: &str,
        source_owner: &str,
    ) -> TransferResult {
        self.transfer
            .transfer_chain(chain, target_owner, source_owner)
            .await
    }

    pub async fn delete_chain(
        &self,
        revision_hash: &str,
        owner: Option<&str>,
        delete_from_latest: bool,
    ) -> DeletionResult {
        self.deletion
            .delete_chain(revision_hash, owner, delete_from_latest)
            .await
    }

    pub async fn order_chain_from_genesis(&self, genesis_hash: &str) -> ChainResult<Vec<String>> {
        self.navigator.order_from_genesis(genesis_hash).await
    }

    pub async fn order_chain_from_latest(&self, tip_hash: &str) -> ChainResult<Vec<String>> {
        self.navigator.order_from_latest(tip_hash).await
    }

    pub async fn can_delete(&self, revision_hash: &str, requester: &str) -> bool {
        authz::can_delete(self.store.as_ref(), revision_hash, requester).await
    }

    pub async fn fetch_chain(&self, tip: &str) -> ChainResult<AquaTree> {
        fetch::fetch_chain(self.store.as_ref(), tip).await
    }

    pub async fn save_tree(
        &self,
        tree: &AquaTree,
        owner: &str,
        options: &SaveOptions,
    ) -> ChainResult<SaveReport> {
        persist::save_tree(self.store.as_ref(), tree, owner, options).await
    }

    /// Chain heads visible to `owner`.
    pub async fn list_latest(&self, owner: &str) -> ChainResult<Vec<LatestRow>> {
        Ok(self.store.list_latest(owner).await?)
    }

    /// Fetch the chain at `tip` and run the verifier over it.
    pub async fn verify_chain(&self, tip: &str) -> ChainResult<Vec<LogData>> {
        let tree = self.fetch_chain(tip).await?;
        self.verifier
            .verify_aqua_tree(&tree)
            .await
            .map_err(|logs| ChainError::from_logs(&logs))
    }

    /// Append a signature by the server key to `owner`'s chain at `tip`.
    pub async fn sign_chain(&self, owner: &str, tip: &str) -> ChainResult<AquaTree> {
        let Some(signer) = &self.signer else {
            return Err(ChainError::SignerUnavailable);
        };
        let tip = PubkeyHash::qualify(tip, owner).to_string();
        let tree = self.fetch_chain(&tip).await?;
        let signed = self
            .verifier
            .sign_aqua_tree(&tree, signer)
            .await
            .map_err(|logs| ChainError::from_logs(&logs))?;
        self.save_tree(&without_links(&signed), owner, &self.head_options(&tip).await?)
            .await?;
        Ok(signed)
    }

    /// Append a link from `owner`'s chain at `tip` to the chain at `linked_tip`.
    ///
    /// `linked_tip` may live in any owner's namespace.
    pub async fn link_chain(&self, owner: &str, tip: &str, linked_tip: &str) -> ChainResult<AquaTree> {
        let tip = PubkeyHash::qualify(tip, owner).to_string();
        let linked_tip = PubkeyHash::qualify(linked_tip, owner).to_string();
        if !self.store.revision_exists(&linked_tip).await? {
            return Err(ChainError::RevisionNotFound(linked_tip));
        }
        let tree = self.fetch_chain(&tip).await?;
        let linked = self.fetch_chain(&linked_tip).await?;
        let out = self
            .verifier
            .link_aqua_tree(&tree, &linked)
            .await
            .map_err(|logs| ChainError::from_logs(&logs))?;
        self.save_tree(&without_links(&out), owner, &self.head_options(&tip).await?)
            .await?;
        Ok(out)
    }

    async fn head_options(&self, tip: &str) -> ChainResult<SaveOptions> {
        Ok(match self.store.get_latest(tip).await? {
            Some(latest) => SaveOptions {
                is_workflow: latest.is_workflow,
                template_id: latest.template_id,
            },
            None => SaveOptions::default(),
        })
    }
}
