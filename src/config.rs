//! Configuration management for Peggy

use crate::address::Network;
use crate::bignum::BigNum;
use crate::crypto::{KeyGenerator, DEFAULT_MAX_KEYGEN_ATTEMPTS};
use crate::error::{PeggyError, Result};
use crate::gateway::DEFAULT_NAMESPACE;
use crate::message::GasPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub keygen: KeygenConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub kind: Network,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            bearer_token: None,
            timeout_secs: default_timeout(),
            namespace: default_namespace(),
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GasConfig {
    #[serde(default = "default_gas_limit")]
    pub limit: i64,
    #[serde(default = "default_fee_cap")]
    pub fee_cap: BigNum,
    #[serde(default = "default_premium")]
    pub premium: BigNum,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            limit: default_gas_limit(),
            fee_cap: default_fee_cap(),
            premium: default_premium(),
        }
    }
}

impl GasConfig {
    pub fn policy(&self) -> GasPolicy {
        GasPolicy {
            gas_limit: self.limit,
            gas_fee_cap: self.fee_cap.clone(),
            gas_premium: self.premium.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeygenConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl KeygenConfig {
    pub fn generator(&self) -> KeyGenerator {
        KeyGenerator::new(self.max_attempts)
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:1234/rpc/v0".to_string()
}

fn default_timeout() -> u64 {
    600
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_gas_limit() -> i64 {
    GasPolicy::default().gas_limit
}

fn default_fee_cap() -> BigNum {
    GasPolicy::default().gas_fee_cap
}

fn default_premium() -> BigNum {
    GasPolicy::default().gas_premium
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_KEYGEN_ATTEMPTS
}

/// `~/.peggy/config.toml`, falling back to `./config.toml` without a home dir.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".peggy").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Loads and validates the configuration. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config_str = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let config = parse_config(&config_str)?;
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<Config> {
    if text.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(toml::from_str(text)?)
}

fn validate(config: &Config) -> Result<()> {
    let endpoint = &config.rpc.endpoint;
    Url::parse(endpoint).map_err(|e| {
        PeggyError::ConfigError(format!("rpc.endpoint '{}' is not a URL: {}", endpoint, e))
    })?;

    if config.rpc.namespace.trim().is_empty() {
        return Err(PeggyError::ConfigError(
            "rpc.namespace must not be empty".to_string(),
        ));
    }

    if config.gas.limit <= 0 {
        return Err(PeggyError::ConfigError(
            "gas.limit must be positive".to_string(),
        ));
    }

    // Gas prices must be non-negative.
    for (field, value) in [
        ("gas.fee_cap", &config.gas.fee_cap),
        ("gas.premium", &config.gas.premium),
    ] {
        if value.is_negative() {
            return Err(PeggyError::InvalidNumber(format!(
                "{} must not be negative, got {}",
                field, value
            )));
        }
    }

    if config.keygen.max_attempts == 0 {
        return Err(PeggyError::ConfigError(
            "keygen.max_attempts must be positive".to_string(),
        ));
    }

    Ok(())
}
