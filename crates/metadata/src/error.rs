//! Metadata store error types.

use crate::repos::chain::DeletionSummary;
use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// A deletion transaction that rolled back.
///
/// `partial` holds the counts accumulated before the failure. None of them
/// were committed.
#[derive(Debug, Error)]
#[error("deletion rolled back: {source}")]
pub struct DeletionFailure {
    pub partial: DeletionSummary,
    #[source]
    pub source: MetadataError,
}
