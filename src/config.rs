//! Configuration module for token-forge
//!
//! Configuration is loaded from a TOML file, with `.env` / environment
//! variable overrides for the values that usually differ per machine.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;

use crate::mint_provisioner::ExistenceCheckPolicy;
use crate::types::Network;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub creation: CreationConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Target network
    #[serde(default = "default_network")]
    pub network: Network,

    /// RPC endpoint override; the network's public endpoint when unset
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Commitment level: processed, confirmed or finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,

    /// Wallet id to prefer when several are available
    #[serde(default)]
    pub preferred_wallet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreationConfig {
    /// Submission attempts per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Mint rotations allowed after on-ledger "already in use" failures
    #[serde(default = "default_max_collision_retries")]
    pub max_collision_retries: u32,

    /// Keypair generations per provisioning call
    #[serde(default = "default_max_mint_generation_attempts")]
    pub max_mint_generation_attempts: u32,

    /// Fixed delay between attempts
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Balance below which the payer is considered unfunded
    #[serde(default = "default_min_balance_lamports")]
    pub min_balance_lamports: u64,

    /// Faucet credit requested on test networks
    #[serde(default = "default_airdrop_lamports")]
    pub airdrop_lamports: u64,

    #[serde(default)]
    pub existence_check_policy: ExistenceCheckPolicy,

    /// Upper bound on the external signer wait; unbounded when unset
    #[serde(default)]
    pub signer_timeout_secs: Option<u64>,

    #[serde(default)]
    pub skip_preflight: bool,

    #[serde(default = "default_confirm_poll_interval_ms")]
    pub confirm_poll_interval_ms: u64,

    #[serde(default = "default_airdrop_confirm_timeout_secs")]
    pub airdrop_confirm_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringConfig {
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// Default value functions
fn default_network() -> Network { Network::Devnet }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_max_retries() -> u32 { 3 }
fn default_max_collision_retries() -> u32 { 3 }
fn default_max_mint_generation_attempts() -> u32 { 10 }
fn default_retry_backoff_ms() -> u64 { 1_000 }
fn default_min_balance_lamports() -> u64 { 10_000_000 }
fn default_airdrop_lamports() -> u64 { 1_000_000_000 }
fn default_confirm_poll_interval_ms() -> u64 { 500 }
fn default_airdrop_confirm_timeout_secs() -> u64 { 30 }
fn default_true() -> bool { true }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            rpc_url: None,
            commitment: default_commitment(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
            preferred_wallet: None,
        }
    }
}

impl Default for CreationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_collision_retries: default_max_collision_retries(),
            max_mint_generation_attempts: default_max_mint_generation_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            min_balance_lamports: default_min_balance_lamports(),
            airdrop_lamports: default_airdrop_lamports(),
            existence_check_policy: ExistenceCheckPolicy::default(),
            signer_timeout_secs: None,
            skip_preflight: false,
            confirm_poll_interval_ms: default_confirm_poll_interval_ms(),
            airdrop_confirm_timeout_secs: default_airdrop_confirm_timeout_secs(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            enable_metrics: default_true(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            wallet: WalletConfig::default(),
            creation: CreationConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// RPC endpoint to use
    pub fn rpc_url(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| self.network.default_rpc_url().to_string())
    }

    pub fn commitment_config(&self) -> anyhow::Result<CommitmentConfig> {
        match self.commitment.to_ascii_lowercase().as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => bail!("Unknown commitment level '{}'", other),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    /// Load configuration, then apply `.env` / environment overrides
    ///
    /// Recognized variables: `TOKEN_FORGE_NETWORK`, `TOKEN_FORGE_RPC_URL`,
    /// `TOKEN_FORGE_KEYPAIR`.
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(network) = std::env::var("TOKEN_FORGE_NETWORK") {
            self.network.network = network
                .parse()
                .map_err(|e| anyhow::anyhow!("TOKEN_FORGE_NETWORK: {}", e))?;
        }
        if let Ok(url) = std::env::var("TOKEN_FORGE_RPC_URL") {
            self.network.rpc_url = Some(url);
        }
        if let Ok(path) = std::env::var("TOKEN_FORGE_KEYPAIR") {
            self.wallet.keypair_path = path;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        let c = &self.creation;
        if c.max_retries == 0 {
            bail!("creation.max_retries must be at least 1");
        }
        if c.max_mint_generation_attempts == 0 {
            bail!("creation.max_mint_generation_attempts must be at least 1");
        }
        if c.airdrop_lamports == 0 {
            bail!("creation.airdrop_lamports must be greater than 0");
        }
        if c.confirm_poll_interval_ms == 0 {
            bail!("creation.confirm_poll_interval_ms must be greater than 0");
        }
        if c.signer_timeout_secs == Some(0) {
            bail!("creation.signer_timeout_secs must be greater than 0 when set");
        }
        self.network.commitment_config()?;
        Ok(())
    }
}
