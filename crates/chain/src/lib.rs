//! Chain operations over persisted AquaTree revision chains.
//!
//! This crate provides:
//! - Forward and backward chain navigation
//! - Tree persistence and materialization
//! - Cross-owner chain transfer
//! - Cascading, transactional chain deletion
//! - Genesis assembly through the Tree Verifier seam
//! - The `AquaChainService` facade

pub mod authz;
pub mod deletion;
pub mod error;
pub mod fetch;
pub mod genesis;
pub mod navigator;
pub mod persist;
pub mod service;
pub mod transfer;
pub mod verifier;

pub use authz::can_delete;
pub use deletion::{DeletionDetails, DeletionEngine, DeletionResult};
pub use error::{ChainError, ChainResult};
pub use fetch::fetch_chain;
pub use genesis::GenesisAssembler;
pub use navigator::ChainNavigator;
pub use persist::{SaveOptions, SaveReport, save_tree};
pub use service::AquaChainService;
pub use transfer::{TransferEngine, TransferItem, TransferOutcome, TransferResult};
pub use verifier::{GenesisOptions, LocalVerifier, LogData, LogType, TreeVerifier};
