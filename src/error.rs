//! Error types for Peggy

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeggyError {
    InvalidNumber(String),
    InvalidAddress(String),
    ChecksumMismatch,
    UnsupportedKeyType(String),
    MalformedKeystore(String),
    KeyGenerationFailed(String),
    SigningFailed(String),
    RpcFailure(String),
    InsufficientFunds { required: String, available: String },
    OwnerMismatch { expected: String, actual: String },
    MessageFailed { cid: String, exit_code: i64 },
    ConfigError(String),
    IoError(String),
}

impl fmt::Display for PeggyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PeggyError::InvalidNumber(msg) => write!(f, "Invalid number: {}", msg),
            PeggyError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            PeggyError::ChecksumMismatch => write!(f, "Address checksum mismatch"),
            PeggyError::UnsupportedKeyType(kind) => write!(f, "Unsupported key type: {}", kind),
            PeggyError::MalformedKeystore(msg) => write!(f, "Malformed keystore: {}", msg),
            PeggyError::KeyGenerationFailed(msg) => write!(f, "Key generation failed: {}", msg),
            PeggyError::SigningFailed(msg) => write!(f, "Signing failed: {}", msg),
            PeggyError::RpcFailure(msg) => write!(f, "RPC failure: {}", msg),
            PeggyError::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "Insufficient funds: required {} but balance is {}",
                required, available
            ),
            PeggyError::OwnerMismatch { expected, actual } => write!(
                f,
                "Sender {} is not the miner owner (owner is {})",
                actual, expected
            ),
            PeggyError::MessageFailed { cid, exit_code } => write!(
                f,
                "Message {} failed on chain with exit code {}",
                cid, exit_code
            ),
            PeggyError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            PeggyError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for PeggyError {}

impl From<std::io::Error> for PeggyError {
    fn from(err: std::io::Error) -> Self {
        PeggyError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for PeggyError {
    fn from(err: toml::de::Error) -> Self {
        PeggyError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for PeggyError {
    fn from(err: reqwest::Error) -> Self {
        PeggyError::RpcFailure(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, PeggyError>;
