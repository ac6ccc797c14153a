//! Genesis assembly and file deduplication.

mod common;

use aqua_chain::verifier::{GenesisOptions, LocalVerifier, LogData, TreeVerifier, VerifierResult};
use aqua_chain::ChainError;
use aqua_core::{AquaTree, FileObject, GenesisContent, RevisionType};
use aqua_signer::RevisionSigner;
use async_trait::async_trait;
use common::*;
use serde_json::json;
use std::sync::Arc;

/// Verifier whose signing key is unusable.
struct LockedWallet(LocalVerifier);

#[async_trait]
impl TreeVerifier for LockedWallet {
    async fn create_genesis_revision(
        &self,
        file: &FileObject,
        content: &GenesisContent,
        options: &GenesisOptions,
    ) -> VerifierResult<AquaTree> {
        self.0.create_genesis_revision(file, content, options).await
    }

    async fn link_aqua_tree(&self, tree: &AquaTree, linked: &AquaTree) -> VerifierResult<AquaTree> {
        self.0.link_aqua_tree(tree, linked).await
    }

    async fn sign_aqua_tree(
        &self,
        _tree: &AquaTree,
        _signer: &RevisionSigner,
    ) -> VerifierResult<AquaTree> {
        Err(vec![LogData::error("wallet locked")])
    }

    async fn verify_aqua_tree(&self, tree: &AquaTree) -> VerifierResult<Vec<LogData>> {
        self.0.verify_aqua_tree(tree).await
    }
}

#[tokio::test]
async fn test_genesis_registers_file_and_index() {
    let harness = TestHarness::new().await;
    let store = harness.store();

    let (tree, genesis) = harness.genesis(U1, "hello", "hello.txt").await;
    let pubkey_hash = qualified(U1, &genesis);

    assert_eq!(tree.revisions.len(), 1);
    assert_eq!(tree.genesis_file_hash(), Some(HELLO_HASH));

    let file = store.get_file(HELLO_HASH).await.unwrap().unwrap();
    assert_eq!(file.file_size, Some(5));
    assert!(file.file_location.ends_with("-hello.txt"));

    let index = store.get_file_index(HELLO_HASH).await.unwrap().unwrap();
    assert_eq!(index.pubkey_hashes.0, vec![pubkey_hash.clone()]);

    assert_eq!(
        store.get_file_name(&pubkey_hash).await.unwrap().as_deref(),
        Some("hello.txt")
    );
    assert!(store.get_latest(&pubkey_hash).await.unwrap().is_some());
    assert_eq!(harness.blob_count(), 1);
}

#[tokio::test]
async fn test_genesis_file_object_points_at_download_url() {
    let harness = TestHarness::new().await;

    let (_, file) = harness
        .service
        .create_genesis_tree(U1, GenesisContent::File(b"hello".to_vec()), "hello.txt")
        .await
        .unwrap();

    assert_eq!(file.file_name, "hello.txt");
    assert_eq!(
        file.file_content,
        format!("http://127.0.0.1:3000/files/{HELLO_HASH}")
    );
    assert_eq!(file.file_size, Some(5));
}

#[tokio::test]
async fn test_same_content_is_stored_once_across_owners() {
    let harness = TestHarness::new().await;
    let store = harness.store();

    let (_, g1) = harness.genesis(U1, "hello", "hello.txt").await;
    let (_, g2) = harness.genesis(U2, "hello", "greeting.txt").await;

    assert_eq!(harness.blob_count(), 1);
    let index = store.get_file_index(HELLO_HASH).await.unwrap().unwrap();
    assert_eq!(
        index.pubkey_hashes.0,
        vec![qualified(U1, &g1), qualified(U2, &g2)]
    );
    assert_eq!(
        store
            .get_file_name(&qualified(U2, &g2))
            .await
            .unwrap()
            .as_deref(),
        Some("greeting.txt")
    );
}

#[tokio::test]
async fn test_auto_sign_appends_signature_revision() {
    let harness = TestHarness::with_signer().await;
    let store = harness.store();

    let (tree, genesis) = harness.genesis(U1, "hello", "hello.txt").await;
    assert_eq!(tree.revisions.len(), 2);

    let tip = tree.tip_hash().unwrap().to_string();
    let signature = &tree.revisions[&tip];
    assert_eq!(signature.revision_type, RevisionType::Signature);
    assert_eq!(signature.previous_verification_hash, genesis);

    // Head sits on the signature, not the genesis.
    assert!(store.get_latest(&qualified(U1, &tip)).await.unwrap().is_some());
    assert!(
        store
            .get_latest(&qualified(U1, &genesis))
            .await
            .unwrap()
            .is_none()
    );

    let logs = harness
        .service
        .verify_chain(&qualified(U1, &tip))
        .await
        .unwrap();
    assert!(!logs.is_empty());
}

#[tokio::test]
async fn test_form_genesis_persists_fields_and_leaves() {
    let harness = TestHarness::new().await;
    let store = harness.store();

    let mut form = serde_json::Map::new();
    form.insert("name".to_string(), json!("alice"));
    form.insert("age".to_string(), json!(30));

    let (tree, _) = harness
        .service
        .create_genesis_tree(U1, GenesisContent::Form(form), "form.json")
        .await
        .unwrap();
    let genesis = tree.genesis_hash().unwrap().to_string();
    let revision = &tree.revisions[&genesis];
    assert_eq!(revision.revision_type, RevisionType::Form);
    assert!(revision.leaves.is_some());

    let pubkey_hash = qualified(U1, &genesis);
    let fields = store.get_form_fields(&pubkey_hash).await.unwrap();
    let mut keys: Vec<_> = fields
        .iter()
        .map(|f| (f.key.as_str(), f.value_type.as_str()))
        .collect();
    keys.sort();
    assert_eq!(keys, vec![("forms_age", "number"), ("forms_name", "string")]);

    let fetched = harness.service.fetch_chain(&pubkey_hash).await.unwrap();
    assert_eq!(fetched.revisions, tree.revisions);
    harness.service.verify_chain(&pubkey_hash).await.unwrap();
}

#[tokio::test]
async fn test_sign_chain_without_key_fails() {
    let harness = TestHarness::new().await;
    let (_, genesis) = harness.genesis(U1, "hello", "hello.txt").await;

    let err = harness
        .service
        .sign_chain(U1, &genesis)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::SignerUnavailable));
}

#[tokio::test]
async fn test_auto_sign_failure_persists_nothing() {
    let harness = TestHarness::with_verifier(Arc::new(LockedWallet(LocalVerifier::new()))).await;
    let store = harness.store();

    let result = harness
        .service
        .create_genesis_tree(U1, GenesisContent::File(b"hello".to_vec()), "hello.txt")
        .await;

    match result {
        Err(ChainError::Verifier(message)) => assert!(message.contains("wallet locked")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("genesis should fail when auto-sign fails"),
    }
    assert!(store.get_file(HELLO_HASH).await.unwrap().is_none());
    assert!(store.get_file_index(HELLO_HASH).await.unwrap().is_none());
    assert!(store.list_latest(U1).await.unwrap().is_empty());
    assert!(store.list_revisions_by_owner(U1).await.unwrap().is_empty());
    assert_eq!(harness.blob_count(), 0);
}
