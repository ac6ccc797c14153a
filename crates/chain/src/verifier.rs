//! The Tree Verifier seam.
//!
//! Revision creation and verification are delegated to a [`TreeVerifier`].
//! Expected failures come back as `Err(logs)`, never as panics.
//! [`LocalVerifier`] is the in-process implementation: a revision's
//! verification hash is `0x` + hex(sha256) of its canonical JSON.

use aqua_core::{
    AquaTree, ContentHash, FORM_FIELD_PREFIX, FileObject, GenesisContent, RevisionType,
    TreeRevision, file_hash,
};
use aqua_signer::{RevisionSignature, RevisionSigner, verify_hash_signature};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

pub const VERSION_SCALAR: &str = "aquachain/v1 | SHA256 | Method: scalar";
pub const VERSION_TREE: &str = "aquachain/v1 | SHA256 | Method: tree";
pub const LINK_TYPE_AQUA: &str = "aqua";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Info,
    Success,
    Warning,
    Error,
}

/// One verifier log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogData {
    pub log_type: LogType,
    pub message: String,
}

impl LogData {
    pub fn new(log_type: LogType, message: impl Into<String>) -> Self {
        Self {
            log_type,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogType::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogType::Success, message)
    }
}

pub type VerifierResult<T> = Result<T, Vec<LogData>>;

/// Options for genesis creation.
#[derive(Clone, Copy, Debug)]
pub struct GenesisOptions {
    /// Embed UTF-8 file content in the revision.
    pub enable_content: bool,
    /// Hash as a single scalar instead of per-field leaves.
    pub enable_scalar: bool,
}

/// Creates and checks revisions.
#[async_trait]
pub trait TreeVerifier: Send + Sync {
    /// Build a single-revision tree for `content`.
    async fn create_genesis_revision(
        &self,
        file: &FileObject,
        content: &GenesisContent,
        options: &GenesisOptions,
    ) -> VerifierResult<AquaTree>;

    /// Append a link revision from `tree`'s tip to `linked`'s tip.
    async fn link_aqua_tree(&self, tree: &AquaTree, linked: &AquaTree) -> VerifierResult<AquaTree>;

    /// Append a signature over `tree`'s tip.
    async fn sign_aqua_tree(
        &self,
        tree: &AquaTree,
        signer: &RevisionSigner,
    ) -> VerifierResult<AquaTree>;

    /// Check hashes, linkage and signatures of every revision.
    async fn verify_aqua_tree(&self, tree: &AquaTree) -> VerifierResult<Vec<LogData>>;
}

/// Verification hash of a revision.
pub fn revision_hash(revision: &TreeRevision) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(revision)?;
    Ok(ContentHash::compute(&bytes).to_verification_hash())
}

/// Insert `revision` under its verification hash and return the hash.
pub fn append_revision(
    tree: &mut AquaTree,
    revision: TreeRevision,
) -> Result<String, serde_json::Error> {
    let hash = revision_hash(&revision)?;
    tree.revisions.insert(hash.clone(), revision);
    Ok(hash)
}

/// Current UTC time as `YYYYMMDDHHMMSS`.
pub fn local_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[year][month][day][hour][minute][second]"
        ))
        .unwrap_or_default()
}

/// Per-field hashes of a revision, in key order.
fn compute_leaves(revision: &TreeRevision) -> Result<Vec<String>, serde_json::Error> {
    let Value::Object(map) = serde_json::to_value(revision)? else {
        return Ok(Vec::new());
    };
    let mut entries: Vec<_> = map.iter().filter(|(key, _)| *key != "leaves").collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    Ok(entries
        .into_iter()
        .map(|(key, value)| ContentHash::compute(format!("{key}:{value}").as_bytes()).to_hex())
        .collect())
}

fn json_logs(err: serde_json::Error) -> Vec<LogData> {
    vec![LogData::error(format!("failed to serialize revision: {err}"))]
}

fn tip_or_logs(tree: &AquaTree) -> VerifierResult<String> {
    tree.tip_hash()
        .map(str::to_string)
        .ok_or_else(|| vec![LogData::error("tree has no revisions")])
}

/// In-process verifier.
#[derive(Clone, Debug, Default)]
pub struct LocalVerifier;

impl LocalVerifier {
    pub fn new() -> Self {
        Self
    }

    fn verify_tree(tree: &AquaTree, logs: &mut Vec<LogData>, seen: &mut HashSet<String>) {
        let genesis_count = tree.revisions.values().filter(|r| r.is_genesis()).count();
        if genesis_count != 1 {
            logs.push(LogData::error(format!(
                "expected one genesis revision, found {genesis_count}"
            )));
        }

        for hash in tree.ordered_hashes() {
            let Some(revision) = tree.revisions.get(&hash) else {
                continue;
            };
            if !seen.insert(hash.clone()) {
                continue;
            }

            match revision_hash(revision) {
                Ok(computed) if computed == hash => {}
                Ok(computed) => logs.push(LogData::error(format!(
                    "revision {hash} hashes to {computed}"
                ))),
                Err(err) => logs.push(LogData::error(format!("revision {hash}: {err}"))),
            }

            if !revision.is_genesis()
                && !tree
                    .revisions
                    .contains_key(&revision.previous_verification_hash)
            {
                logs.push(LogData::error(format!(
                    "revision {hash} references missing previous {}",
                    revision.previous_verification_hash
                )));
            }

            if let (Some(content), Some(expected)) = (&revision.content, &revision.file_hash)
                && file_hash(content.as_bytes()) != *expected
            {
                logs.push(LogData::error(format!(
                    "revision {hash} content does not match its file hash"
                )));
            }

            match revision.revision_type {
                RevisionType::Signature => Self::verify_signature(&hash, revision, logs),
                RevisionType::Link => {
                    for linked in revision.link_verification_hashes.iter().flatten() {
                        if let Some(linked_tree) = tree.linked_chains.get(linked) {
                            Self::verify_tree(linked_tree, logs, seen);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn verify_signature(hash: &str, revision: &TreeRevision, logs: &mut Vec<LogData>) {
        let (Some(signature), Some(public_key), Some(wallet_address), Some(signature_type)) = (
            &revision.signature,
            &revision.signature_public_key,
            &revision.signature_wallet_address,
            &revision.signature_type,
        ) else {
            logs.push(LogData::error(format!(
                "signature revision {hash} is missing signature fields"
            )));
            return;
        };

        let signature = RevisionSignature {
            signature: signature.clone(),
            public_key: public_key.clone(),
            wallet_address: wallet_address.clone(),
            signature_type: signature_type.clone(),
        };
        if let Err(err) = verify_hash_signature(&revision.previous_verification_hash, &signature) {
            logs.push(LogData::error(format!(
                "signature revision {hash} failed verification: {err}"
            )));
        }
    }
}

#[async_trait]
impl TreeVerifier for LocalVerifier {
    async fn create_genesis_revision(
        &self,
        file: &FileObject,
        content: &GenesisContent,
        options: &GenesisOptions,
    ) -> VerifierResult<AquaTree> {
        let bytes = content
            .to_bytes()
            .map_err(|e| vec![LogData::error(e.to_string())])?;
        let revision_type = if content.is_form() {
            RevisionType::Form
        } else {
            RevisionType::File
        };

        let mut revision = TreeRevision::new(revision_type, "", local_timestamp());
        revision.version = if options.enable_scalar {
            VERSION_SCALAR
        } else {
            VERSION_TREE
        }
        .to_string();
        revision.file_hash = Some(file_hash(&bytes));
        revision.file_nonce = Some(Uuid::new_v4().simple().to_string());

        match content {
            GenesisContent::File(data) => {
                if options.enable_content
                    && let Ok(text) = std::str::from_utf8(data)
                {
                    revision.content = Some(text.to_string());
                }
            }
            GenesisContent::Form(map) => {
                for (key, value) in map {
                    let key = if key.starts_with(FORM_FIELD_PREFIX) {
                        key.clone()
                    } else {
                        format!("{FORM_FIELD_PREFIX}{key}")
                    };
                    revision.fields.insert(key, value.clone());
                }
            }
        }

        if !options.enable_scalar {
            revision.leaves = Some(compute_leaves(&revision).map_err(json_logs)?);
        }

        let mut tree = AquaTree::default();
        let hash = append_revision(&mut tree, revision).map_err(json_logs)?;
        tree.file_index.insert(hash, file.file_name.clone());
        Ok(tree)
    }

    async fn link_aqua_tree(&self, tree: &AquaTree, linked: &AquaTree) -> VerifierResult<AquaTree> {
        let tip = tip_or_logs(tree)?;
        let linked_tip = tip_or_logs(linked)?;

        let mut revision = TreeRevision::new(RevisionType::Link, tip, local_timestamp());
        revision.version = VERSION_SCALAR.to_string();
        revision.link_type = Some(LINK_TYPE_AQUA.to_string());
        revision.link_verification_hashes = Some(vec![linked_tip.clone()]);
        revision.link_file_hashes = Some(
            linked
                .genesis_file_hash()
                .map(str::to_string)
                .into_iter()
                .collect(),
        );
        revision.link_require_indepth_verification = Some(false);

        let mut out = tree.clone();
        append_revision(&mut out, revision).map_err(json_logs)?;
        if let Some(name) = linked
            .genesis_hash()
            .and_then(|genesis| linked.file_name_for(genesis))
        {
            out.file_index.insert(linked_tip.clone(), name.to_string());
        }
        out.linked_chains.insert(linked_tip, linked.clone());
        Ok(out)
    }

    async fn sign_aqua_tree(
        &self,
        tree: &AquaTree,
        signer: &RevisionSigner,
    ) -> VerifierResult<AquaTree> {
        let tip = tip_or_logs(tree)?;
        let signature = signer.sign_hash(&tip);

        let mut revision = TreeRevision::new(RevisionType::Signature, tip, local_timestamp());
        revision.version = VERSION_SCALAR.to_string();
        revision.signature = Some(signature.signature);
        revision.signature_public_key = Some(signature.public_key);
        revision.signature_wallet_address = Some(signature.wallet_address);
        revision.signature_type = Some(signature.signature_type);

        let mut out = tree.clone();
        append_revision(&mut out, revision).map_err(json_logs)?;
        Ok(out)
    }

    async fn verify_aqua_tree(&self, tree: &AquaTree) -> VerifierResult<Vec<LogData>> {
        let mut logs = Vec::new();
        Self::verify_tree(tree, &mut logs, &mut HashSet::new());

        if logs.iter().any(|log| log.log_type == LogType::Error) {
            return Err(logs);
        }
        logs.push(LogData::success(format!(
            "verified {} revisions",
            tree.revisions.len()
        )));
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_object(name: &str) -> FileObject {
        FileObject {
            file_name: name.to_string(),
            file_content: String::new(),
            path: format!("./{name}"),
            file_size: None,
        }
    }

    fn scalar() -> GenesisOptions {
        GenesisOptions {
            enable_content: false,
            enable_scalar: true,
        }
    }

    #[tokio::test]
    async fn test_genesis_hashes_content() {
        let verifier = LocalVerifier::new();
        let tree = verifier
            .create_genesis_revision(
                &file_object("hello.txt"),
                &GenesisContent::File(b"hello".to_vec()),
                &scalar(),
            )
            .await
            .unwrap();

        assert_eq!(tree.revisions.len(), 1);
        assert_eq!(
            tree.genesis_file_hash(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        let genesis = tree.genesis_hash().unwrap();
        assert!(genesis.starts_with("0x"));
        assert_eq!(tree.file_index.get(genesis).map(String::as_str), Some("hello.txt"));
        verifier.verify_aqua_tree(&tree).await.unwrap();
    }

    #[tokio::test]
    async fn test_form_genesis_spreads_fields_and_leaves() {
        let verifier = LocalVerifier::new();
        let mut form = serde_json::Map::new();
        form.insert("name".to_string(), Value::from("Alice"));
        form.insert("forms_age".to_string(), Value::from(30));

        let tree = verifier
            .create_genesis_revision(
                &file_object("form.json"),
                &GenesisContent::Form(form),
                &GenesisOptions {
                    enable_content: false,
                    enable_scalar: false,
                },
            )
            .await
            .unwrap();

        let genesis = tree.genesis().unwrap();
        assert_eq!(genesis.revision_type, RevisionType::Form);
        let keys: Vec<_> = genesis.form_fields().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["forms_age", "forms_name"]);
        assert!(genesis.leaves.as_ref().is_some_and(|l| !l.is_empty()));
        verifier.verify_aqua_tree(&tree).await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_and_link_verify() {
        let verifier = LocalVerifier::new();
        let signer = RevisionSigner::generate("test");
        let base = verifier
            .create_genesis_revision(
                &file_object("a.txt"),
                &GenesisContent::File(b"a".to_vec()),
                &scalar(),
            )
            .await
            .unwrap();
        let other = verifier
            .create_genesis_revision(
                &file_object("b.txt"),
                &GenesisContent::File(b"b".to_vec()),
                &scalar(),
            )
            .await
            .unwrap();

        let signed = verifier.sign_aqua_tree(&base, &signer).await.unwrap();
        let linked = verifier.link_aqua_tree(&signed, &other).await.unwrap();

        assert_eq!(linked.revisions.len(), 3);
        assert_eq!(linked.linked_chains.len(), 1);
        let logs = verifier.verify_aqua_tree(&linked).await.unwrap();
        assert_eq!(logs.last().map(|l| l.log_type), Some(LogType::Success));
    }

    #[tokio::test]
    async fn test_tampered_revision_fails_verification() {
        let verifier = LocalVerifier::new();
        let signer = RevisionSigner::generate("test");
        let base = verifier
            .create_genesis_revision(
                &file_object("a.txt"),
                &GenesisContent::File(b"a".to_vec()),
                &scalar(),
            )
            .await
            .unwrap();
        let mut signed = verifier.sign_aqua_tree(&base, &signer).await.unwrap();

        let tip = signed.tip_hash().unwrap().to_string();
        if let Some(rev) = signed.revisions.get_mut(&tip) {
            rev.signature_wallet_address = Some("0xdeadbeef".to_string());
        }

        let logs = verifier.verify_aqua_tree(&signed).await.unwrap_err();
        assert!(logs.iter().any(|l| l.message.contains("hashes to")));
        assert!(logs.iter().any(|l| l.message.contains("failed verification")));
    }
}
