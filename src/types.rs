//! Common types used throughout the token creation pipeline

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::errors::TokenCreationError;
use crate::tx_builder::instructions::mint_amount;

/// Maximum token name length (characters)
pub const MAX_NAME_LEN: usize = 32;

/// Maximum token symbol length (characters)
pub const MAX_SYMBOL_LEN: usize = 10;

/// Maximum decimal places a mint may declare
pub const MAX_DECIMALS: u8 = 9;

/// Upper bound on the user-facing supply (before decimal scaling)
pub const MAX_TOTAL_SUPPLY: u64 = 1_000_000_000_000;

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

const EXPLORER_BASE_URL: &str = "https://explorer.solana.com";

/// Target ledger network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Test network with a faucet
    Devnet,
    /// Production network, no faucet
    Mainnet,
}

impl Network {
    /// Default public RPC endpoint for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Devnet => "https://api.devnet.solana.com",
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
        }
    }

    /// Whether a faucet (airdrop) exists on this network
    pub fn has_faucet(&self) -> bool {
        matches!(self, Network::Devnet)
    }

    /// Query-string qualifier the explorer expects for this network
    pub fn explorer_cluster_param(&self) -> &'static str {
        match self {
            Network::Devnet => "?cluster=devnet",
            Network::Mainnet => "",
        }
    }

    /// Explorer URL for an address on this network
    pub fn explorer_address_url(&self, address: &Pubkey) -> String {
        format!(
            "{}/address/{}{}",
            EXPLORER_BASE_URL,
            address,
            self.explorer_cluster_param()
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::Mainnet => "mainnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Network {
    type Err = TokenCreationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" => Ok(Network::Devnet),
            "mainnet" | "mainnet-beta" => Ok(Network::Mainnet),
            other => Err(TokenCreationError::InvalidInput(format!(
                "unknown network '{}'",
                other
            ))),
        }
    }
}

/// Descriptive fields carried alongside the token; never written on chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
}

/// Immutable input to the creation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreationData {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: u64,
    #[serde(default, flatten)]
    pub metadata: TokenMetadata,
}

impl TokenCreationData {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8, total_supply: u64) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            total_supply,
            metadata: TokenMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: TokenMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate all fields before any ledger interaction.
    ///
    /// Also rejects supplies whose base-unit amount (`total_supply * 10^decimals`)
    /// does not fit in 64 bits.
    pub fn validate(&self) -> Result<(), TokenCreationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TokenCreationError::InvalidInput(
                "token name is required".to_string(),
            ));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(TokenCreationError::InvalidInput(format!(
                "token name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }

        if self.symbol.is_empty() || self.symbol.chars().count() > MAX_SYMBOL_LEN {
            return Err(TokenCreationError::InvalidInput(format!(
                "token symbol must be 1-{} characters",
                MAX_SYMBOL_LEN
            )));
        }
        if !self
            .symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(TokenCreationError::InvalidInput(
                "token symbol must be uppercase letters and digits only".to_string(),
            ));
        }

        if self.decimals > MAX_DECIMALS {
            return Err(TokenCreationError::InvalidInput(format!(
                "decimals must be between 0 and {}",
                MAX_DECIMALS
            )));
        }

        if self.total_supply == 0 || self.total_supply > MAX_TOTAL_SUPPLY {
            return Err(TokenCreationError::InvalidInput(format!(
                "total supply must be between 1 and {}",
                MAX_TOTAL_SUPPLY
            )));
        }

        mint_amount(self.total_supply, self.decimals).map_err(|_| {
            TokenCreationError::InvalidInput(format!(
                "total supply {} with {} decimals exceeds the largest mintable amount",
                self.total_supply, self.decimals
            ))
        })?;
        Ok(())
    }
}

/// Terminal result of a successful creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
    pub mint_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub total_supply: u64,
    pub decimals: u8,
    pub transaction_signature: String,
    pub explorer_url: String,
    pub network: Network,
}

impl TokenResult {
    pub fn new(
        mint: &Pubkey,
        data: &TokenCreationData,
        signature: &Signature,
        network: Network,
    ) -> Self {
        Self {
            mint_address: mint.to_string(),
            token_name: data.name.clone(),
            token_symbol: data.symbol.clone(),
            total_supply: data.total_supply,
            decimals: data.decimals,
            transaction_signature: signature.to_string(),
            explorer_url: network.explorer_address_url(mint),
            network,
        }
    }
}
