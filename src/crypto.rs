//! Key material for Peggy accounts (secp256k1)

use crate::error::PeggyError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use secp256k1::{
    constants::{SECRET_KEY_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE},
    All, PublicKey, Secp256k1, SecretKey,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Rejected draws tolerated before the RNG is considered broken. A healthy
/// source essentially never produces an invalid scalar.
pub const DEFAULT_MAX_KEYGEN_ATTEMPTS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Secp256k1,
    Bls,
}

impl KeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::Secp256k1 => "secp256k1",
            KeyType::Bls => "bls",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = PeggyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secp256k1" => Ok(KeyType::Secp256k1),
            "bls" => Ok(KeyType::Bls),
            other => Err(PeggyError::UnsupportedKeyType(other.to_string())),
        }
    }
}

/// An in-memory account key. Only secp256k1 keys can be constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    key_type: KeyType,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Re-derives a keypair from a stored private scalar. An unusable scalar
    /// means the store it came from is corrupt, hence `MalformedKeystore`.
    pub fn from_private_key(key_type: KeyType, bytes: &[u8]) -> Result<Self, PeggyError> {
        match key_type {
            KeyType::Bls => Err(PeggyError::UnsupportedKeyType(key_type.to_string())),
            KeyType::Secp256k1 => {
                if bytes.len() != SECRET_KEY_SIZE {
                    return Err(PeggyError::MalformedKeystore(format!(
                        "Secret key must be {} bytes, got {}",
                        SECRET_KEY_SIZE,
                        bytes.len()
                    )));
                }
                let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
                    PeggyError::MalformedKeystore(format!("Invalid secret key bytes: {}", e))
                })?;
                Ok(Self::from_secret_key(secret_key))
            }
        }
    }

    fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            key_type: KeyType::Secp256k1,
            secret_key,
            public_key,
        }
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn private_key_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.secret_key.secret_bytes()
    }

    /// The 65-byte uncompressed public key (`0x04 ‖ X ‖ Y`).
    pub fn public_key_bytes(&self) -> [u8; UNCOMPRESSED_PUBLIC_KEY_SIZE] {
        self.public_key.serialize_uncompressed()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_type", &self.key_type)
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Produces fresh keypairs from a cryptographically secure random source.
#[derive(Debug, Clone, Copy)]
pub struct KeyGenerator {
    max_attempts: u32,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYGEN_ATTEMPTS)
    }
}

impl KeyGenerator {
    pub fn new(max_attempts: u32) -> Self {
        KeyGenerator {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Generates a keypair using the OS random number generator.
    pub fn generate(&self, key_type: KeyType) -> Result<KeyPair, PeggyError> {
        self.generate_with_rng(key_type, &mut OsRng)
    }

    pub fn generate_with_rng<R: RngCore + CryptoRng>(
        &self,
        key_type: KeyType,
        rng: &mut R,
    ) -> Result<KeyPair, PeggyError> {
        match key_type {
            KeyType::Secp256k1 => self.generate_secp256k1(rng),
            KeyType::Bls => Err(PeggyError::UnsupportedKeyType(key_type.to_string())),
        }
    }

    fn generate_secp256k1<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<KeyPair, PeggyError> {
        let mut candidate = [0u8; SECRET_KEY_SIZE];
        for attempt in 1..=self.max_attempts {
            rng.try_fill_bytes(&mut candidate).map_err(|e| {
                PeggyError::KeyGenerationFailed(format!("random source failure: {}", e))
            })?;
            // Rejects zero and values at or above the curve order.
            if let Ok(secret_key) = SecretKey::from_slice(&candidate) {
                debug!("Accepted secp256k1 scalar after {} draw(s)", attempt);
                return Ok(KeyPair::from_secret_key(secret_key));
            }
        }
        warn!(
            "No valid secp256k1 scalar after {} draws; random source looks broken",
            self.max_attempts
        );
        Err(PeggyError::KeyGenerationFailed(format!(
            "no valid secp256k1 scalar after {} attempts",
            self.max_attempts
        )))
    }
}
