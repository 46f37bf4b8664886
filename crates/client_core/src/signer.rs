//! Signing capability attached to a wallet session.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use ed25519_dalek::{Signer as _, SigningKey};
use thiserror::Error;
use zeroize::Zeroize;

const SEED_LEN: usize = 32;

pub trait Signer: Send + Sync {
    /// Stable identity of the key; a change means a different session.
    fn identity(&self) -> &str;
    fn sign(&self, message: &[u8]) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signer seed is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("invalid signer seed length: expected {expected}, got {actual}")]
    SeedLength { expected: usize, actual: usize },
}

/// Local ed25519 key; identity is the url-safe base64 verifying key.
pub struct Ed25519Signer {
    signing_key: SigningKey,
    identity: String,
}

impl Ed25519Signer {
    pub fn from_seed(seed: &[u8; SEED_LEN]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let identity = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            identity,
        }
    }

    pub fn from_base64_seed(encoded: &str) -> Result<Self, SignerError> {
        let mut decoded = STANDARD.decode(encoded.trim())?;
        if decoded.len() != SEED_LEN {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(SignerError::SeedLength {
                expected: SEED_LEN,
                actual,
            });
        }
        let mut seed = [0u8; SEED_LEN];
        seed.copy_from_slice(&decoded);
        decoded.zeroize();
        let signer = Self::from_seed(&seed);
        seed.zeroize();
        Ok(signer)
    }
}

impl Signer for Ed25519Signer {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn sign(&self, message: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }
}
