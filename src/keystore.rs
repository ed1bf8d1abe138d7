//! Portable keystore blobs.
//!
//! A blob is the lowercase hex encoding of compact JSON
//! `{"Type":"secp256k1","PrivateKey":"<base64>"}`. It carries no public key
//! or address; both are re-derived when the blob is opened.

use crate::crypto::{KeyPair, KeyType};
use crate::error::{PeggyError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// JSON shape of the blob. Field order is part of the format.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyInfoJson {
    #[serde(rename = "Type")]
    key_type: String,
    #[serde(rename = "PrivateKey")]
    private_key: String,
}

pub fn encode(key_type: KeyType, private_key: &[u8]) -> Result<String> {
    let info = KeyInfoJson {
        key_type: key_type.to_string(),
        private_key: STANDARD.encode(private_key),
    };
    let json = serde_json::to_string(&info)
        .map_err(|e| PeggyError::MalformedKeystore(format!("serialization failed: {}", e)))?;
    Ok(hex::encode(json))
}

pub fn encode_key_pair(key_pair: &KeyPair) -> Result<String> {
    encode(key_pair.key_type(), &key_pair.private_key_bytes())
}

/// Opens a blob and re-derives its keypair.
///
/// Surrounding whitespace, uppercase hex and reordered JSON fields are
/// accepted, so only blobs produced by [`encode`] re-encode to the same hex.
/// Unknown JSON fields are rejected.
pub fn decode(blob: &str) -> Result<KeyPair> {
    let raw = hex::decode(blob.trim())
        .map_err(|e| PeggyError::MalformedKeystore(format!("invalid hex: {}", e)))?;
    let info: KeyInfoJson = serde_json::from_slice(&raw)
        .map_err(|e| PeggyError::MalformedKeystore(format!("invalid key info: {}", e)))?;
    // Unknown types are reported as such even when the key field is also bad.
    let key_type: KeyType = info.key_type.parse()?;
    let private_key = STANDARD
        .decode(&info.private_key)
        .map_err(|e| PeggyError::MalformedKeystore(format!("invalid base64 key: {}", e)))?;
    KeyPair::from_private_key(key_type, &private_key)
}
