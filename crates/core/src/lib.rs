//! Core domain types for AquaTree revision chains.
//!
//! This crate defines the hash-chain model used across all other crates:
//! - Content and verification hashes
//! - Owner-qualified revision identifiers
//! - Revision types and the AquaTree transport shape
//! - Configuration types

pub mod config;
pub mod error;
pub mod hash;
pub mod pubkey_hash;
pub mod revision;
pub mod tree;

pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher, file_hash};
pub use pubkey_hash::{PubkeyHash, bare_hash, owner_prefix};
pub use revision::RevisionType;
pub use tree::{AquaTree, FORM_FIELD_PREFIX, FileObject, GenesisContent, TreeRevision};

/// Filename recorded when a transferred chain carries no name for a file.
pub const UNKNOWN_FILE_NAME: &str = "+ Unknown File";
