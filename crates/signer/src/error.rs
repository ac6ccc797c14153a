//! Signer error types.

use thiserror::Error;

/// Signing operation errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("key parsing error: {0}")]
    KeyParsing(String),

    #[error("verification failed")]
    VerificationFailed,

    #[error("invalid signature format: {0}")]
    InvalidSignature(String),
}

/// Result type for signing operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
