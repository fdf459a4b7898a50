//! Configuration module for the pool bootstrap client
//!
//! This module handles configuration loading from TOML files and
//! environment variables (a `.env` file is honoured), and validates the
//! result before anything touches the ledger.

use serde::{Deserialize, Serialize};
use solana_sdk::{packet::PACKET_DATA_SIZE, pubkey::Pubkey};
use std::str::FromStr;
use std::time::Duration;

use crate::tx_builder::context::parse_commitment;
use crate::tx_builder::instructions::DEFAULT_MAX_SIGNATURES;
use crate::tx_builder::{
    BootstrapContext, BootstrapError, CurveType, FeeFraction, SequencerLimits, SwapPoolConfig,
};
use crate::types::{Cluster, MintInfo};
use crate::wallet::WalletManager;

/// Environment variable overriding `cluster.rpc_url`
pub const ENV_RPC_URL: &str = "RPC_URL";
/// Environment variable holding a base58 payer secret key
pub const ENV_OWNER_PRV_KEY: &str = "OWNER_PRV_KEY";
/// Environment variable overriding `wallet.keypair_path`
pub const ENV_OWNER_KEYPAIR_PATH: &str = "OWNER_KEYPAIR_PATH";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cluster and endpoint selection
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Payer identity
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Pool to bootstrap (required by `create-pool` only)
    #[serde(default)]
    pub pool: Option<PoolConfig>,

    /// Static mint metadata, used instead of ledger lookups when present
    #[serde(default)]
    pub mints: Vec<MintInfo>,

    /// Submission and packing limits
    #[serde(default)]
    pub submission: SubmissionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// devnet, testnet, mainnet-beta or localnet
    #[serde(default = "default_cluster")]
    pub name: String,

    /// JSON-RPC endpoint; defaults to the cluster's public endpoint
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Pubsub endpoint; derived from `rpc_url` when absent
    #[serde(default)]
    pub ws_url: Option<String>,

    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Swap program override (required on localnet)
    #[serde(default)]
    pub swap_program_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default)]
    pub keypair_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub mint_a: String,
    pub mint_b: String,

    /// Owner of the LP fee account
    pub fee_owner: String,

    #[serde(default = "default_pool_mint_decimals")]
    pub pool_mint_decimals: u8,

    /// Confirm each transaction before sending the next
    #[serde(default = "default_true")]
    pub sequential: bool,

    #[serde(default)]
    pub fees: FeesConfig,

    #[serde(default)]
    pub curve: CurveType,

    /// Initial deposits, in base units of each mint
    #[serde(default)]
    pub seed_liquidity: Option<SeedLiquidityConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeesConfig {
    #[serde(default = "default_trade_fee")]
    pub trade: FeeFraction,
    #[serde(default = "default_owner_trade_fee")]
    pub owner_trade: FeeFraction,
    #[serde(default = "default_owner_withdraw_fee")]
    pub owner_withdraw: FeeFraction,
    #[serde(default = "default_host_fee")]
    pub host: FeeFraction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeedLiquidityConfig {
    pub amount_a: u64,
    pub amount_b: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_transaction_bytes")]
    pub max_transaction_bytes: usize,

    #[serde(default = "default_max_signatures")]
    pub max_signatures: usize,
}

// Default value functions
fn default_cluster() -> String { "devnet".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_pool_mint_decimals() -> u8 { 2 }
fn default_true() -> bool { true }
fn default_trade_fee() -> FeeFraction { SwapPoolConfig::default().trade_fee() }
fn default_owner_trade_fee() -> FeeFraction { SwapPoolConfig::default().owner_trade_fee() }
fn default_owner_withdraw_fee() -> FeeFraction { SwapPoolConfig::default().owner_withdraw_fee() }
fn default_host_fee() -> FeeFraction { SwapPoolConfig::default().host_fee() }
fn default_confirmation_timeout() -> u64 { 60 }
fn default_poll_interval() -> u64 { 500 }
fn default_max_transaction_bytes() -> usize { PACKET_DATA_SIZE }
fn default_max_signatures() -> usize { DEFAULT_MAX_SIGNATURES }

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: default_cluster(),
            rpc_url: None,
            ws_url: None,
            commitment: default_commitment(),
            swap_program_id: None,
        }
    }
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            trade: default_trade_fee(),
            owner_trade: default_owner_trade_fee(),
            owner_withdraw: default_owner_withdraw_fee(),
            host: default_host_fee(),
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: default_confirmation_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_transaction_bytes: default_max_transaction_bytes(),
            max_signatures: default_max_signatures(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, BootstrapError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BootstrapError::config(format!("cannot read {}: {}", path, e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, BootstrapError> {
        toml::from_str(content).map_err(|e| BootstrapError::config(format!("invalid TOML: {}", e)))
    }

    /// Load `.env`, the optional TOML file and environment overrides, then validate
    pub fn load(path: Option<&str>) -> Result<Self, BootstrapError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_RPC_URL).filter(|v| !v.is_empty()) {
            self.cluster.rpc_url = Some(url);
        }
        if let Some(path) = lookup(ENV_OWNER_KEYPAIR_PATH).filter(|v| !v.is_empty()) {
            self.wallet.keypair_path = Some(path);
        }
    }

    /// Check every field that can be checked without the ledger
    pub fn validate(&self) -> Result<(), BootstrapError> {
        let cluster = self.cluster_kind()?;
        parse_commitment(&self.cluster.commitment)?;
        cluster.program_ids(self.swap_program_override()?)?;

        for url in self.cluster.rpc_url.iter() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(BootstrapError::config(format!(
                    "rpc_url must be http(s), got '{}'",
                    url
                )));
            }
        }
        for url in self.cluster.ws_url.iter() {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(BootstrapError::config(format!(
                    "ws_url must be ws(s), got '{}'",
                    url
                )));
            }
        }

        if let Some(pool) = &self.pool {
            pool.validate()?;
        }

        let submission = &self.submission;
        if submission.confirmation_timeout_secs == 0 {
            return Err(BootstrapError::config("confirmation_timeout_secs must be > 0"));
        }
        if submission.poll_interval_ms == 0 {
            return Err(BootstrapError::config("poll_interval_ms must be > 0"));
        }
        if submission.max_transaction_bytes == 0 || submission.max_transaction_bytes > PACKET_DATA_SIZE {
            return Err(BootstrapError::config(format!(
                "max_transaction_bytes must be within 1..={}",
                PACKET_DATA_SIZE
            )));
        }
        if submission.max_signatures == 0 {
            return Err(BootstrapError::config("max_signatures must be > 0"));
        }

        Ok(())
    }

    pub fn cluster_kind(&self) -> Result<Cluster, BootstrapError> {
        Cluster::from_str(&self.cluster.name)
    }

    pub fn swap_program_override(&self) -> Result<Option<Pubkey>, BootstrapError> {
        self.cluster
            .swap_program_id
            .as_deref()
            .map(|id| parse_pubkey("swap_program_id", id))
            .transpose()
    }

    /// Connection parameters for this configuration
    pub fn context(&self) -> Result<BootstrapContext, BootstrapError> {
        let ctx = BootstrapContext::for_cluster(
            self.cluster_kind()?,
            self.cluster.rpc_url.clone(),
            self.swap_program_override()?,
        )?;
        Ok(ctx
            .with_commitment(parse_commitment(&self.cluster.commitment)?)
            .with_timeouts(
                Duration::from_secs(self.submission.confirmation_timeout_secs),
                Duration::from_millis(self.submission.poll_interval_ms),
            ))
    }

    /// Pubsub endpoint, explicit or derived from the RPC endpoint
    pub fn websocket_url(&self) -> Result<String, BootstrapError> {
        match &self.cluster.ws_url {
            Some(url) => Ok(url.clone()),
            None => Ok(self.context()?.websocket_endpoint()),
        }
    }

    pub fn limits(&self) -> SequencerLimits {
        SequencerLimits {
            max_transaction_bytes: self.submission.max_transaction_bytes,
            max_signatures: self.submission.max_signatures,
        }
    }

    /// Payer from `OWNER_PRV_KEY` if set, otherwise from the keypair file
    pub fn load_wallet(&self) -> anyhow::Result<WalletManager> {
        if let Ok(secret) = std::env::var(ENV_OWNER_PRV_KEY) {
            if !secret.is_empty() {
                return WalletManager::from_base58(&secret);
            }
        }
        match &self.wallet.keypair_path {
            Some(path) => WalletManager::from_file(&expand_home(path)),
            None => anyhow::bail!(
                "No payer identity: set {} or wallet.keypair_path",
                ENV_OWNER_PRV_KEY
            ),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), BootstrapError> {
        let (mint_a, mint_b) = self.mints()?;
        if mint_a == mint_b {
            return Err(BootstrapError::config("mint_a and mint_b must differ"));
        }
        self.fee_owner()?;
        self.swap_pool_config()?;
        if let Some(seed) = &self.seed_liquidity {
            if seed.amount_a == 0 || seed.amount_b == 0 {
                return Err(BootstrapError::config("seed_liquidity amounts must be > 0"));
            }
        }
        Ok(())
    }

    pub fn mints(&self) -> Result<(Pubkey, Pubkey), BootstrapError> {
        Ok((
            parse_pubkey("mint_a", &self.mint_a)?,
            parse_pubkey("mint_b", &self.mint_b)?,
        ))
    }

    pub fn fee_owner(&self) -> Result<Pubkey, BootstrapError> {
        parse_pubkey("fee_owner", &self.fee_owner)
    }

    pub fn swap_pool_config(&self) -> Result<SwapPoolConfig, BootstrapError> {
        SwapPoolConfig::new(
            self.fees.trade,
            self.fees.owner_trade,
            self.fees.owner_withdraw,
            self.fees.host,
            self.curve,
        )
    }
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey, BootstrapError> {
    Pubkey::from_str(value.trim())
        .map_err(|e| BootstrapError::config(format!("{} '{}' is not a valid address: {}", field, value, e)))
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}
