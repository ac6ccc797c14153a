//! Server-held signing keys for AquaTree revisions.
//!
//! This crate provides:
//! - Ed25519 key generation and key-string parsing
//! - Wallet-style addresses derived from public keys
//! - Signing and verification of revision verification hashes

pub mod error;
pub mod key;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use key::{KeyPair, PublicKey, SecretKey};
pub use signer::{RevisionSignature, RevisionSigner, SIGNATURE_TYPE, verify_hash_signature};
