//! AquaTree transport shapes.
//!
//! An [`AquaTree`] is the materialized view of one chain: revisions keyed by
//! their bare verification hash, a filename index, and any chains reached
//! through link revisions. Revisions inside a tree reference each other by
//! bare hash; owner qualification only happens at the persistence boundary.

use crate::revision::RevisionType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Prefix of the flattened form-field keys carried by form revisions.
pub const FORM_FIELD_PREFIX: &str = "forms_";

/// One revision as carried inside an [`AquaTree`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeRevision {
    /// Bare hash of the prior revision, empty for a genesis revision.
    #[serde(default)]
    pub previous_verification_hash: String,
    pub local_timestamp: String,
    pub revision_type: RevisionType,
    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_wallet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_merkle_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_smart_contract_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_sender_account_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_verification_hashes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_file_hashes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_require_indepth_verification: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaves: Option<Vec<String>>,

    /// Remaining keys, including `forms_*` fields of form revisions.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl TreeRevision {
    /// An empty revision of the given type.
    pub fn new(
        revision_type: RevisionType,
        previous_verification_hash: impl Into<String>,
        local_timestamp: impl Into<String>,
    ) -> Self {
        Self {
            previous_verification_hash: previous_verification_hash.into(),
            local_timestamp: local_timestamp.into(),
            revision_type,
            version: String::new(),
            file_hash: None,
            file_nonce: None,
            content: None,
            signature: None,
            signature_public_key: None,
            signature_wallet_address: None,
            signature_type: None,
            witness_merkle_root: None,
            witness_timestamp: None,
            witness_network: None,
            witness_smart_contract_address: None,
            witness_transaction_hash: None,
            witness_sender_account_address: None,
            link_type: None,
            link_verification_hashes: None,
            link_file_hashes: None,
            link_require_indepth_verification: None,
            leaves: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_verification_hash.is_empty()
    }

    /// The `forms_*` fields carried by this revision.
    pub fn form_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields
            .iter()
            .filter(|(key, _)| key.starts_with(FORM_FIELD_PREFIX))
    }
}

/// A materialized chain.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AquaTree {
    pub revisions: BTreeMap<String, TreeRevision>,
    /// Maps a revision or file hash to a human filename.
    #[serde(default)]
    pub file_index: BTreeMap<String, String>,
    /// Chains reached through link revisions, keyed by the linked tip hash.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub linked_chains: BTreeMap<String, AquaTree>,
}

impl AquaTree {
    /// The revision with no previous hash. Lowest hash wins if the tree is malformed.
    pub fn genesis_hash(&self) -> Option<&str> {
        self.revisions
            .iter()
            .find(|(_, rev)| rev.is_genesis())
            .map(|(hash, _)| hash.as_str())
    }

    pub fn genesis(&self) -> Option<&TreeRevision> {
        self.genesis_hash().and_then(|hash| self.revisions.get(hash))
    }

    /// The hash that no other revision names as its previous.
    ///
    /// With several candidates the latest `local_timestamp` wins, then the highest hash.
    pub fn tip_hash(&self) -> Option<&str> {
        let referenced: HashSet<&str> = self
            .revisions
            .values()
            .map(|rev| rev.previous_verification_hash.as_str())
            .filter(|prev| !prev.is_empty())
            .collect();

        self.revisions
            .iter()
            .filter(|(hash, _)| !referenced.contains(hash.as_str()))
            .max_by(|(a_hash, a), (b_hash, b)| {
                a.local_timestamp
                    .cmp(&b.local_timestamp)
                    .then_with(|| a_hash.cmp(b_hash))
            })
            .map(|(hash, _)| hash.as_str())
    }

    /// Revision hashes from genesis to tip.
    ///
    /// At a branch the lowest child hash is followed first. Revisions not
    /// reachable from the genesis are appended in hash order so callers still
    /// see every revision exactly once.
    pub fn ordered_hashes(&self) -> Vec<String> {
        let mut children: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (hash, rev) in &self.revisions {
            if !rev.is_genesis() {
                children
                    .entry(rev.previous_verification_hash.as_str())
                    .or_default()
                    .insert(hash.as_str());
            }
        }

        let mut ordered = Vec::with_capacity(self.revisions.len());
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = self.genesis_hash().into_iter().collect();
        while let Some(hash) = stack.pop() {
            if !seen.insert(hash) {
                continue;
            }
            ordered.push(hash.to_string());
            if let Some(next) = children.get(hash) {
                stack.extend(next.iter().rev());
            }
        }

        for hash in self.revisions.keys() {
            if !seen.contains(hash.as_str()) {
                ordered.push(hash.clone());
            }
        }
        ordered
    }

    /// File hash of the genesis revision.
    pub fn genesis_file_hash(&self) -> Option<&str> {
        self.genesis().and_then(|rev| rev.file_hash.as_deref())
    }

    /// Filename recorded for a revision hash, falling back to its file hash.
    pub fn file_name_for(&self, hash: &str) -> Option<&str> {
        if let Some(name) = self.file_index.get(hash) {
            return Some(name);
        }
        self.revisions
            .get(hash)
            .and_then(|rev| rev.file_hash.as_ref())
            .and_then(|file_hash| self.file_index.get(file_hash))
            .map(String::as_str)
    }
}

/// Raw content handed to genesis creation.
#[derive(Clone, Debug)]
pub enum GenesisContent {
    File(Vec<u8>),
    Form(serde_json::Map<String, Value>),
}

impl GenesisContent {
    /// Bytes hashed into the genesis `file_hash`.
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        match self {
            Self::File(bytes) => Ok(bytes.clone()),
            Self::Form(map) => {
                serde_json::to_vec(map).map_err(|e| crate::Error::Serialization(e.to_string()))
            }
        }
    }

    pub fn is_form(&self) -> bool {
        matches!(self, Self::Form(_))
    }
}

/// Envelope describing a stored file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub file_name: String,
    /// Inline text before persistence, the download URL afterwards.
    pub file_content: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}
