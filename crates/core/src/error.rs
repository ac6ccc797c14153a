//! Error types for the hash-chain model.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid pubkey hash: {0}")]
    InvalidPubkeyHash(String),

    #[error("unknown revision type: {0}")]
    InvalidRevisionType(String),

    #[error("malformed aqua tree: {0}")]
    MalformedTree(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
