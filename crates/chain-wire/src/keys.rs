//! Ed25519 key material and the chain's text key formats.

use crate::types::PublicKey;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Failures parsing a textual secret key.
#[derive(Debug, Error)]
pub enum KeyParseError {
    /// Missing or unknown curve prefix.
    #[error("secret key must start with 'ed25519:'")]
    MissingPrefix,
    /// Payload is not valid base58.
    #[error("secret key payload is not base58: {0}")]
    Base58(String),
    /// Decoded payload has the wrong length.
    #[error("secret key decodes to {0} bytes, expected 32 or 64")]
    BadLength(usize),
}

/// An Ed25519 signing key plus its derived wire-format public key.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
    public: PublicKey,
}

impl KeyPair {
    /// Parses the chain's `ed25519:<base58>` secret-key format. The payload
    /// may be a 32-byte seed or the 64-byte seed-plus-public form.
    pub fn from_secret_str(secret: &str) -> Result<Self, KeyParseError> {
        let payload = secret
            .strip_prefix("ed25519:")
            .ok_or(KeyParseError::MissingPrefix)?;
        let bytes = bs58::decode(payload)
            .into_vec()
            .map_err(|e| KeyParseError::Base58(e.to_string()))?;

        let seed: [u8; 32] = match bytes.len() {
            32 => bytes.as_slice().try_into().unwrap(),
            64 => bytes[..32].try_into().unwrap(),
            n => return Err(KeyParseError::BadLength(n)),
        };
        Ok(Self::from_seed(seed))
    }

    /// Builds a key pair from a raw 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&seed);
        let public = PublicKey::Ed25519(signing.verifying_key().to_bytes());
        Self { signing, public }
    }

    /// Generates a fresh random key pair.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let public = PublicKey::Ed25519(signing.verifying_key().to_bytes());
        Self { signing, public }
    }

    /// The wire-format public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// `ed25519:<base58>` text form of the public key.
    pub fn public_key_str(&self) -> String {
        self.public.to_account_string()
    }

    /// `ed25519:<base58>` text form of the 64-byte secret, as the chain's
    /// tooling emits it.
    pub fn secret_key_str(&self) -> String {
        let mut keypair = [0u8; 64];
        keypair[..32].copy_from_slice(&self.signing.to_bytes());
        keypair[32..].copy_from_slice(&self.signing.verifying_key().to_bytes());
        format!("ed25519:{}", bs58::encode(keypair).into_string())
    }

    /// Signs a message, returning the raw 64 signature bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret material stays out of logs.
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_str())
            .finish_non_exhaustive()
    }
}
