//! Chain operation errors.

use crate::verifier::LogData;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("metadata error: {0}")]
    Metadata(#[from] aqua_metadata::MetadataError),

    #[error("storage error: {0}")]
    Storage(#[from] aqua_storage::StorageError),

    #[error(transparent)]
    Core(#[from] aqua_core::Error),

    #[error("signer error: {0}")]
    Signer(#[from] aqua_signer::SignerError),

    #[error("verifier rejected the tree: {0}")]
    Verifier(String),

    #[error("revision {0} has no file hash")]
    MissingFileHash(String),

    #[error("tree has no genesis revision")]
    GenesisNotFound,

    #[error("no latest entry for chain tip {0}")]
    LatestNotFound(String),

    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    #[error("malformed tree: {0}")]
    MalformedTree(String),

    #[error("no signing key configured")]
    SignerUnavailable,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChainError {
    /// Collapse verifier logs into one error.
    pub fn from_logs(logs: &[LogData]) -> Self {
        let lines: Vec<&str> = logs.iter().map(|log| log.message.as_str()).collect();
        Self::Verifier(lines.join("; "))
    }
}

pub type ChainResult<T> = std::result::Result<T, ChainError>;
