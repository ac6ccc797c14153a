//! Owner-qualified revision identifiers.
//!
//! A revision is persisted under `{owner}_{hash}` so the same content hash can
//! live in several independent chains, one per owner. Addresses and hashes
//! never contain `_`, so the first `_` is always the separator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = '_';

/// An owner-qualified revision hash (`owner_hash`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PubkeyHash {
    owner: String,
    hash: String,
}

impl PubkeyHash {
    /// Qualify a bare revision hash with its owner.
    pub fn new(owner: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            hash: hash.into(),
        }
    }

    /// Parse an already qualified hash, splitting on the first `_`.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s.split_once(SEPARATOR) {
            Some((owner, hash)) if !owner.is_empty() && !hash.is_empty() => {
                Ok(Self::new(owner, hash))
            }
            _ => Err(crate::Error::InvalidPubkeyHash(s.to_string())),
        }
    }

    /// Parse `s` if it embeds an owner, otherwise qualify it with `default_owner`.
    pub fn qualify(s: &str, default_owner: &str) -> Self {
        Self::parse(s).unwrap_or_else(|_| Self::new(default_owner, s))
    }

    /// Whether `s` carries an owner prefix.
    pub fn is_qualified(s: &str) -> bool {
        s.contains(SEPARATOR)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The bare revision hash without the owner.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The same revision hash under a different owner.
    pub fn with_owner(&self, owner: &str) -> Self {
        Self::new(owner, self.hash.clone())
    }
}

impl fmt::Display for PubkeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, SEPARATOR, self.hash)
    }
}

impl FromStr for PubkeyHash {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PubkeyHash {
    type Error = crate::Error;

    fn try_from(s: String) -> crate::Result<Self> {
        Self::parse(&s)
    }
}

impl From<PubkeyHash> for String {
    fn from(value: PubkeyHash) -> Self {
        value.to_string()
    }
}

/// The `owner_` prefix shared by every revision in an owner's namespace.
pub fn owner_prefix(owner: &str) -> String {
    format!("{owner}{SEPARATOR}")
}

/// Strip the owner from a qualified hash, returning bare hashes unchanged.
pub fn bare_hash(s: &str) -> &str {
    s.split_once(SEPARATOR).map(|(_, hash)| hash).unwrap_or(s)
}
