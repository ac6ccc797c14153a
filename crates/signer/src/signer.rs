//! Signing and verification of revision verification hashes.

use crate::error::{SignerError, SignerResult};
use crate::key::{KeyPair, PublicKey, decode_hex, encode_hex};
use ed25519_dalek::Signer as _;
use ed25519_dalek::Verifier;

/// Value written to `signature_type` for signatures made by this crate.
pub const SIGNATURE_TYPE: &str = "ed25519";

/// The signature fields attached to a signature revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionSignature {
    /// `0x`-prefixed hex signature over the signed verification hash.
    pub signature: String,
    pub public_key: String,
    pub wallet_address: String,
    pub signature_type: String,
}

/// Signs revision hashes with the server key.
pub struct RevisionSigner {
    keypair: KeyPair,
}

impl RevisionSigner {
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// Create from a secret key string.
    pub fn from_secret_key_string(s: &str) -> SignerResult<Self> {
        Ok(Self::new(KeyPair::from_secret_key_string(s)?))
    }

    /// Generate a new signer with a random key.
    pub fn generate(key_name: impl Into<String>) -> Self {
        Self::new(KeyPair::generate(key_name))
    }

    pub fn key_name(&self) -> &str {
        &self.keypair.name
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    /// Wallet-style address of the signing key.
    pub fn address(&self) -> String {
        self.keypair.address()
    }

    pub fn secret_key_string(&self) -> String {
        self.keypair.to_secret_key_string()
    }

    /// Sign a verification hash.
    pub fn sign_hash(&self, verification_hash: &str) -> RevisionSignature {
        let sig = self
            .keypair
            .secret
            .signing_key()
            .sign(verification_hash.as_bytes());
        RevisionSignature {
            signature: format!("0x{}", encode_hex(&sig.to_bytes())),
            public_key: self.keypair.public.to_hex(),
            wallet_address: self.keypair.address(),
            signature_type: SIGNATURE_TYPE.to_string(),
        }
    }
}

/// Verify a signature over a verification hash.
///
/// The wallet address must match the one derived from the public key.
pub fn verify_hash_signature(
    verification_hash: &str,
    signature: &RevisionSignature,
) -> SignerResult<()> {
    if signature.signature_type != SIGNATURE_TYPE {
        return Err(SignerError::InvalidSignature(format!(
            "unsupported signature type: {}",
            signature.signature_type
        )));
    }

    let public_key = PublicKey::from_hex(&signature.public_key)?;
    if public_key.address() != signature.wallet_address {
        return Err(SignerError::VerificationFailed);
    }

    let raw = signature
        .signature
        .strip_prefix("0x")
        .unwrap_or(&signature.signature);
    let sig_bytes = decode_hex(raw)
        .map_err(|e| SignerError::InvalidSignature(format!("invalid hex: {e}")))?;
    let sig_array: [u8; 64] = sig_bytes.try_into().map_err(|b: Vec<u8>| {
        SignerError::InvalidSignature(format!("expected 64 bytes, got {}", b.len()))
    })?;
    let sig = ed25519_dalek::Signature::from_bytes(&sig_array);

    public_key
        .verifying_key()
        .verify(verification_hash.as_bytes(), &sig)
        .map_err(|_| SignerError::VerificationFailed)
}
