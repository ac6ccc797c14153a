//! Ed25519 key types for the server-held signing key.

use crate::error::{SignerError, SignerResult};
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;

/// A secret (private) key for signing.
pub struct SecretKey {
    inner: SigningKey,
}

impl SecretKey {
    /// Generate a new random secret key.
    pub fn generate() -> Self {
        let mut rng = rand_core::OsRng;
        Self {
            inner: SigningKey::generate(&mut rng),
        }
    }

    /// Parse from the key-string format: `keyname:base64(secret || public)`.
    pub fn from_key_string(s: &str) -> SignerResult<(String, Self)> {
        let (name, b64) = s.split_once(':').ok_or_else(|| {
            SignerError::KeyParsing("expected 'keyname:base64' format".to_string())
        })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| SignerError::KeyParsing(format!("invalid base64: {e}")))?;

        if bytes.len() != 64 {
            return Err(SignerError::KeyParsing(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }

        let secret_bytes: [u8; 32] = bytes[..32]
            .try_into()
            .map_err(|_| SignerError::KeyParsing("invalid secret key bytes".to_string()))?;
        let inner = SigningKey::from_bytes(&secret_bytes);

        if inner.verifying_key().as_bytes()[..] != bytes[32..] {
            return Err(SignerError::KeyParsing(
                "public half does not match secret key".to_string(),
            ));
        }

        Ok((name.to_string(), Self { inner }))
    }

    /// Encode as a key string.
    pub fn to_key_string(&self, key_name: &str) -> String {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(self.inner.as_bytes());
        bytes.extend_from_slice(self.inner.verifying_key().as_bytes());
        let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        format!("{key_name}:{b64}")
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.verifying_key(),
        }
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// A public key for verification.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Parse from `0x`-prefixed hex, the form stored in `signature_public_key`.
    pub fn from_hex(s: &str) -> SignerResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = decode_hex(s)?;
        let key_bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            SignerError::KeyParsing(format!("expected 32 bytes, got {}", b.len()))
        })?;
        let inner = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| SignerError::KeyParsing(format!("invalid public key: {e}")))?;
        Ok(Self { inner })
    }

    /// Encode as `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", encode_hex(self.inner.as_bytes()))
    }

    /// Wallet-style address derived from the key: `0x` + the last 20 bytes of its SHA-256.
    pub fn address(&self) -> String {
        let digest = Sha256::digest(self.inner.as_bytes());
        format!("0x{}", encode_hex(&digest[12..]))
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.inner
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_hex()[..10])
    }
}

/// A key pair containing both secret and public keys.
pub struct KeyPair {
    /// The key name (e.g., "aquachain-server-1").
    pub name: String,
    /// The secret key.
    pub secret: SecretKey,
    /// The public key.
    pub public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair with the given name.
    pub fn generate(name: impl Into<String>) -> Self {
        let secret = SecretKey::generate();
        let public = secret.public_key();
        Self {
            name: name.into(),
            secret,
            public,
        }
    }

    /// Parse from the secret key-string format.
    pub fn from_secret_key_string(s: &str) -> SignerResult<Self> {
        let (name, secret) = SecretKey::from_key_string(s)?;
        let public = secret.public_key();
        Ok(Self {
            name,
            secret,
            public,
        })
    }

    pub fn to_secret_key_string(&self) -> String {
        self.secret.to_key_string(&self.name)
    }

    /// The wallet-style address revisions signed by this key carry.
    pub fn address(&self) -> String {
        self.public.address()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("name", &self.name)
            .field("public", &self.public)
            .finish()
    }
}

pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn decode_hex(s: &str) -> SignerResult<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(SignerError::KeyParsing(format!(
            "odd-length hex string: {} chars",
            s.len()
        )));
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| SignerError::KeyParsing(format!("invalid hex: {s}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_key_string_roundtrip() {
        let keypair = KeyPair::generate("server-1");
        let encoded = keypair.to_secret_key_string();

        let parsed = KeyPair::from_secret_key_string(&encoded).unwrap();
        assert_eq!(parsed.name, "server-1");
        assert_eq!(parsed.public, keypair.public);
        assert_eq!(parsed.address(), keypair.address());
    }

    #[test]
    fn test_rejects_mismatched_public_half() {
        let a = KeyPair::generate("a").to_secret_key_string();
        let b = KeyPair::generate("b").to_secret_key_string();
        let a_bytes = base64::engine::general_purpose::STANDARD
            .decode(a.split_once(':').unwrap().1)
            .unwrap();
        let b_bytes = base64::engine::general_purpose::STANDARD
            .decode(b.split_once(':').unwrap().1)
            .unwrap();
        let mut spliced = a_bytes[..32].to_vec();
        spliced.extend_from_slice(&b_bytes[32..]);
        let forged = format!(
            "a:{}",
            base64::engine::general_purpose::STANDARD.encode(spliced)
        );
        assert!(matches!(
            KeyPair::from_secret_key_string(&forged),
            Err(SignerError::KeyParsing(_))
        ));
    }

    #[test]
    fn test_address_shape() {
        let keypair = KeyPair::generate("server-1");
        let address = keypair.address();
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);
        assert!(!address.contains('_'));
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let keypair = KeyPair::generate("server-1");
        let hex = keypair.public.to_hex();
        assert_eq!(PublicKey::from_hex(&hex).unwrap(), keypair.public);
    }
}
