//! The atomic cascading deletion transaction.

mod common;

use aqua_core::RevisionType;
use aqua_metadata::EntityKind;
use aqua_metadata::models::{FileRow, WitnessEventRow};
use aqua_metadata::repos::NewRevision;
use common::*;
use time::OffsetDateTime;

fn hashes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// `g -> a -> b -> c` under `0xu1`, each non-genesis revision signed.
async fn seed_chain(metadata: &TestMetadata) {
    let store = metadata.store();
    store
        .persist_revision(&file_genesis("0xu1", "0xg", "fh"))
        .await
        .unwrap();
    store
        .persist_revision(&signature_revision("0xu1", "0xa", "0xu1_0xg", "sig-a"))
        .await
        .unwrap();
    store
        .persist_revision(&signature_revision("0xu1", "0xb", "0xu1_0xa", "sig-b"))
        .await
        .unwrap();
    store
        .persist_revision(&signature_revision("0xu1", "0xc", "0xu1_0xb", "sig-c"))
        .await
        .unwrap();
    store.upsert_latest(&latest("0xu1_0xc", "0xu1")).await.unwrap();
}

#[tokio::test]
async fn test_leaf_first_deletion_repoints_latest() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    seed_chain(&metadata).await;
    let store = metadata.store();

    let summary = store
        .delete_revisions(&hashes(&["0xu1_0xc", "0xu1_0xb", "0xu1_0xa"]), false)
        .await
        .unwrap();

    assert_eq!(summary.revisions, hashes(&["0xu1_0xc", "0xu1_0xb", "0xu1_0xa"]));
    assert_eq!(summary.related.signatures, 3);
    assert_eq!(summary.latest_repointed, 3);
    assert!(summary.blob_locations.is_empty());

    assert!(store.revision_exists("0xu1_0xg").await.unwrap());
    let genesis = store.get_revision("0xu1_0xg").await.unwrap().unwrap();
    assert!(genesis.children.0.is_empty());
    assert!(store.get_latest("0xu1_0xg").await.unwrap().is_some());
    assert!(store.get_latest("0xu1_0xc").await.unwrap().is_none());
    assert!(store.get_file_index("fh").await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_from_latest_removes_head() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    seed_chain(&metadata).await;
    let store = metadata.store();

    let summary = store
        .delete_revisions(&hashes(&["0xu1_0xc"]), true)
        .await
        .unwrap();

    assert_eq!(summary.latest_removed, 1);
    assert!(store.list_latest("0xu1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_genesis_drops_head_and_file() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    store
        .register_file(
            &FileRow {
                file_hash: "fh".to_string(),
                file_location: "s3://abc-hello.txt".to_string(),
                file_size: Some(5),
                created_at: OffsetDateTime::now_utc(),
            },
            "0xu1_0xg",
        )
        .await
        .unwrap();
    store
        .persist_revision(&file_genesis("0xu1", "0xg", "fh"))
        .await
        .unwrap();
    store.upsert_latest(&latest("0xu1_0xg", "0xu1")).await.unwrap();

    let summary = store
        .delete_revisions(&hashes(&["0xu1_0xg"]), false)
        .await
        .unwrap();

    assert_eq!(summary.related.file_indexes, 1);
    assert_eq!(summary.related.files, 1);
    assert_eq!(summary.blob_locations, vec!["s3://abc-hello.txt".to_string()]);
    assert_eq!(summary.latest_removed, 1);
    assert!(store.get_file("fh").await.unwrap().is_none());
    assert!(store.get_file_name("0xu1_0xg").await.unwrap().is_none());
}

#[tokio::test]
async fn test_shared_file_survives_other_owner_deletion() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    for owner in ["0xu1", "0xu2"] {
        store
            .persist_revision(&file_genesis(owner, "0xg", "fh"))
            .await
            .unwrap();
    }

    let summary = store
        .delete_revisions(&hashes(&["0xu2_0xg"]), false)
        .await
        .unwrap();

    assert_eq!(summary.related.file_indexes, 0);
    let index = store.get_file_index("fh").await.unwrap().unwrap();
    assert_eq!(index.pubkey_hashes.0, vec!["0xu1_0xg"]);
}

#[tokio::test]
async fn test_shared_signature_keeps_positive_count() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    for owner in ["0xu1", "0xu2"] {
        store
            .persist_revision(&plain(revision(owner, "0xg", None, RevisionType::File)))
            .await
            .unwrap();
        store
            .persist_revision(&signature_revision(
                owner,
                "0xa",
                &format!("{owner}_0xg"),
                "sig-a",
            ))
            .await
            .unwrap();
    }

    let summary = store
        .delete_revisions(&hashes(&["0xu2_0xa"]), false)
        .await
        .unwrap();

    assert_eq!(summary.related.signatures, 0);
    assert_eq!(
        store
            .reference_count(EntityKind::Signature, "sig-a")
            .await
            .unwrap(),
        Some(1)
    );
}

#[tokio::test]
async fn test_witness_event_released_with_last_witness() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let event = WitnessEventRow {
        merkle_root: "root".to_string(),
        witness_timestamp: Some(1_700_000_000),
        witness_network: Some("sepolia".to_string()),
        witness_smart_contract_address: None,
        witness_transaction_hash: Some("0xtx".to_string()),
        witness_sender_account_address: None,
    };

    store
        .persist_revision(&plain(revision("0xu1", "0xg", None, RevisionType::File)))
        .await
        .unwrap();
    for hash in ["0xw1", "0xw2"] {
        let mut row = revision("0xu1", hash, Some("0xu1_0xg"), RevisionType::Witness);
        row.entity_key = Some(hash.to_string());
        store
            .persist_revision(&NewRevision {
                entity: Some(witness_record(hash, "root")),
                witness_event: Some(event.clone()),
                ..plain(row)
            })
            .await
            .unwrap();
    }

    store
        .delete_revisions(&hashes(&["0xu1_0xw1"]), false)
        .await
        .unwrap();
    assert!(store.get_witness_event("root").await.unwrap().is_some());

    let summary = store
        .delete_revisions(&hashes(&["0xu1_0xw2"]), false)
        .await
        .unwrap();
    assert_eq!(summary.related.witnesses, 1);
    assert!(store.get_witness_event("root").await.unwrap().is_none());
}

#[tokio::test]
async fn test_form_fields_are_removed() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();

    let mut row = revision("0xu1", "0xf", None, RevisionType::Form);
    row.file_hash = Some("formhash".to_string());
    let fields = ["forms_age", "forms_name"]
        .iter()
        .map(|key| aqua_metadata::models::FormFieldRow {
            pubkey_hash: "0xu1_0xf".to_string(),
            key: key.to_string(),
            value: sqlx::types::Json(serde_json::json!("x")),
            value_type: "string".to_string(),
        })
        .collect();
    store
        .persist_revision(&NewRevision {
            form_fields: fields,
            file_reference: Some("formhash".to_string()),
            ..plain(row)
        })
        .await
        .unwrap();
    assert_eq!(store.get_form_fields("0xu1_0xf").await.unwrap().len(), 2);

    let summary = store
        .delete_revisions(&hashes(&["0xu1_0xf"]), false)
        .await
        .unwrap();
    assert_eq!(summary.related.forms, 2);
    assert_eq!(summary.related.file_indexes, 1);
    assert_eq!(summary.related.files, 0);
    assert!(store.get_form_fields("0xu1_0xf").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failure_rolls_back_every_deletion() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    seed_chain(&metadata).await;
    let store = metadata.store();

    sqlx::query(
        "INSERT INTO revisions (pubkey_hash, owner, previous, local_timestamp, revision_type, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind("0xu1_0xbad")
    .bind("0xu1")
    .bind("0xu1_0xc")
    .bind("20250101000000")
    .bind("bogus")
    .bind(OffsetDateTime::now_utc())
    .execute(metadata.pool())
    .await
    .unwrap();

    let failure = store
        .delete_revisions(&hashes(&["0xu1_0xc", "0xu1_0xbad"]), false)
        .await
        .unwrap_err();

    assert_eq!(failure.partial.revisions, hashes(&["0xu1_0xc"]));
    assert!(store.revision_exists("0xu1_0xc").await.unwrap());
    assert!(store.get_latest("0xu1_0xc").await.unwrap().is_some());
    assert_eq!(
        store
            .reference_count(EntityKind::Signature, "sig-c")
            .await
            .unwrap(),
        Some(1)
    );
}
