//! A chain service over an in-memory store and a temporary blob root.

use aqua_chain::{AquaChainService, LocalVerifier, SaveOptions, TreeVerifier};
use aqua_core::config::GenesisConfig;
use aqua_core::{AquaTree, GenesisContent};
use aqua_metadata::{MetadataStore, SqliteStore};
use aqua_signer::RevisionSigner;
use aqua_storage::{BlobStore, FilesystemBackend};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const U1: &str = "0xu1";
pub const U2: &str = "0xu2";
pub const U3: &str = "0xu3";

/// sha256("hello")
pub const HELLO_HASH: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

#[allow(dead_code)]
pub struct TestHarness {
    pub service: AquaChainService,
    sqlite: Arc<SqliteStore>,
    blob_root: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestHarness {
    /// Harness without a signing key.
    pub async fn new() -> Self {
        Self::build(None, Arc::new(LocalVerifier::new())).await
    }

    /// Harness that auto-signs every genesis tree.
    pub async fn with_signer() -> Self {
        Self::with_verifier(Arc::new(LocalVerifier::new())).await
    }

    /// Auto-signing harness over a custom verifier.
    pub async fn with_verifier(verifier: Arc<dyn TreeVerifier>) -> Self {
        Self::build(Some(RevisionSigner::generate("test-key")), verifier).await
    }

    async fn build(signer: Option<RevisionSigner>, verifier: Arc<dyn TreeVerifier>) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let blob_root = temp_dir.path().join("blobs");
        let sqlite = Arc::new(
            SqliteStore::new(":memory:")
                .await
                .expect("Failed to open in-memory store"),
        );
        let backend = FilesystemBackend::new(&blob_root)
            .await
            .expect("Failed to create blob root");

        let genesis = GenesisConfig {
            auto_sign: signer.is_some(),
            ..GenesisConfig::default()
        };
        let service = AquaChainService::new(
            sqlite.clone(),
            BlobStore::from_backend(Arc::new(backend)),
            verifier,
            signer,
            genesis,
        );

        Self {
            service,
            sqlite,
            blob_root,
            _temp_dir: temp_dir,
        }
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.service.store().clone()
    }

    /// Raw pool for queries the store does not expose.
    pub fn pool(&self) -> &Pool<Sqlite> {
        self.sqlite.pool()
    }

    /// Create a text genesis for `owner` and return the tree with its bare genesis hash.
    pub async fn genesis(&self, owner: &str, text: &str, name: &str) -> (AquaTree, String) {
        let (tree, _) = self
            .service
            .create_genesis_tree(owner, GenesisContent::File(text.as_bytes().to_vec()), name)
            .await
            .expect("genesis creation failed");
        let genesis = tree.genesis_hash().expect("tree has a genesis").to_string();
        (tree, genesis)
    }

    /// Sign `owner`'s genesis with two different keys, giving it two children.
    ///
    /// Returns the bare hashes of both signature revisions.
    pub async fn branch(&self, owner: &str, genesis: &str) -> (String, String) {
        let base = self
            .service
            .fetch_chain(&qualified(owner, genesis))
            .await
            .expect("genesis is stored");
        let verifier = LocalVerifier::new();
        let mut tips = Vec::new();
        for key in ["left-key", "right-key"] {
            let signed = verifier
                .sign_aqua_tree(&base, &RevisionSigner::generate(key))
                .await
                .expect("signing failed");
            self.service
                .save_tree(&signed, owner, &SaveOptions::default())
                .await
                .expect("save failed");
            tips.push(signed.tip_hash().expect("signed tree has a tip").to_string());
        }
        (tips.remove(0), tips.remove(0))
    }

    /// Number of blobs under the local root.
    pub fn blob_count(&self) -> usize {
        std::fs::read_dir(&self.blob_root)
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0)
    }
}

/// `owner_hash`
#[allow(dead_code)]
pub fn qualified(owner: &str, hash: &str) -> String {
    format!("{owner}_{hash}")
}
