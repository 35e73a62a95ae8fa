//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `baseclean.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, the signing key) are referenced by env-var name in
//! the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

/// The conventional burn address. Nobody holds its key.
pub const DEFAULT_DEAD_ADDRESS: &str = "0x000000000000000000000000000000000000dEaD";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub alchemy: AlchemyConfig,
    #[serde(default)]
    pub prices: PricesConfig,
    #[serde(default)]
    pub spam: SpamConfig,
    #[serde(default)]
    pub burn: BurnConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    /// Env var holding the JSON-RPC URL used for sending transactions.
    pub rpc_url_env: String,
    /// Env var holding the hex private key of the burning wallet.
    pub private_key_env: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlchemyConfig {
    /// Alchemy network slug, e.g. `base-mainnet`.
    pub network: String,
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricesConfig {
    pub enabled: bool,
    /// DeFiLlama chain prefix, e.g. `base`.
    pub defillama_chain: String,
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            defillama_chain: "base".to_string(),
        }
    }
}

/// Spam heuristics thresholds. See `spam::SpamClassifier`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SpamConfig {
    pub spam_threshold: u32,
    pub suspicious_threshold: u32,
    /// Score required to call a medium-value asset spam.
    pub medium_value_threshold: u32,
    pub dust_value_usd: Decimal,
    pub medium_value_usd: Decimal,
    /// At or above this value an asset is never flagged as spam.
    pub high_value_usd: Decimal,
    pub max_name_len: usize,
    /// Human-unit balance above which an airdrop is considered implausible.
    pub implausible_balance: Decimal,
    pub allowlist: Vec<String>,
    pub blocklist: Vec<String>,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            spam_threshold: 5,
            suspicious_threshold: 3,
            medium_value_threshold: 8,
            dust_value_usd: dec!(1),
            medium_value_usd: dec!(10),
            high_value_usd: dec!(100),
            max_name_len: 30,
            implausible_balance: dec!(1000000000),
            allowlist: Vec::new(),
            blocklist: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BurnConfig {
    pub dead_address: String,
    pub batch_size: usize,
    pub delay_between_batches_ms: u64,
    pub receipt_timeout_secs: u64,
    /// Use `transferFrom` instead of `safeTransferFrom` for ERC-721.
    pub erc721_unsafe_transfer: bool,
    pub dry_run: bool,
}

impl Default for BurnConfig {
    fn default() -> Self {
        Self {
            dead_address: DEFAULT_DEAD_ADDRESS.to_string(),
            batch_size: 3,
            delay_between_batches_ms: 500,
            receipt_timeout_secs: 120,
            erc721_unsafe_transfer: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub price_ttl_secs: u64,
    pub metadata_ttl_secs: u64,
    /// Directory for persisted cache files. Memory-only when absent.
    pub dir: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            price_ttl_secs: 300,
            metadata_ttl_secs: 86_400,
            dir: Some(".baseclean/cache".to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub history_file: String,
    pub last_scan_file: String,
    pub max_history: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_file: ".baseclean/burn_history.json".to_string(),
            last_scan_file: ".baseclean/last_scan.json".to_string(),
            max_history: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { port: 8787 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        if config.burn.batch_size == 0 {
            anyhow::bail!("burn.batch_size must be at least 1");
        }
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve the signing key without letting it leak through `Debug`.
    pub fn private_key(&self) -> Result<SecretString> {
        Self::resolve_env(&self.chain.private_key_env).map(SecretString::new)
    }
}
