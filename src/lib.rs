//! token-forge - SPL token creation pipeline
//!
//! Provisions a fresh mint, its rent-exempt account, the owner's associated
//! token account and the full initial supply in a single transaction co-signed
//! by the mint keypair and an external wallet.
//!
//! The entry point is [`TokenCreator::create_token`].

pub mod balance_guard;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod mint_provisioner;
pub mod observability;
pub mod structured_logging;
pub mod submission;
pub mod token_creator;
pub mod types;
pub mod wallet;

// Export the modular tx_builder
pub mod tx_builder;

// Component modules with non-standard paths (directories with spaces)
#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

// Re-export commonly used types
pub use errors::{CreationFailure, TokenCreationError};
pub use rpc_manager::{LedgerClient, LedgerError, MockLedger, SolanaLedger};
pub use token_creator::TokenCreator;
pub use types::{Network, TokenCreationData, TokenMetadata, TokenResult};
pub use wallet::{ExternalSigner, KeypairWallet, MockWallet, WalletError, WalletRegistry};

pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
