//! Public error taxonomy for token creation
//!
//! `AccountCollision` and `StaleBlockhash` are recovered inside the
//! submission engine and never returned from `TokenCreator::create_token`.
//! Everything else terminates the request. `create_token` hands the terminal
//! error back inside a `CreationFailure`, which also records how many
//! envelopes reached the ledger first.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::rpc_manager::LedgerError;
use crate::tx_builder::TransactionBuilderError;
use crate::types::LAMPORTS_PER_SOL;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenCreationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Wallet adapter address mismatch (expected {expected}, wallet reports {actual})")]
    WalletAddressMismatch { expected: Pubkey, actual: Pubkey },

    /// Balance below the fee/rent threshold and no faucet credit was obtained
    #[error(
        "Insufficient SOL balance: {required} lamports required{}{}",
        available.as_ref().map(|a| format!(", {} available", a)).unwrap_or_default(),
        faucet_error.as_ref().map(|e| format!(" (faucet: {})", e)).unwrap_or_default()
    )]
    InsufficientFunds {
        required: u64,
        /// `None` when the ledger rejected the transaction without reporting a balance
        available: Option<u64>,
        faucet_error: Option<String>,
    },

    /// The faucet accepted the request but the credit never became usable
    #[error("Airdrop failed: {0}")]
    AirdropFailed(String),

    #[error("No free mint address found after {attempts} attempts")]
    MintAddressExhausted { attempts: u32 },

    #[error("Mint account already in use: {0}")]
    AccountCollision(String),

    #[error("Stale block reference: {0}")]
    StaleBlockhash(String),

    #[error("Wallet rejected the signature request: {0}")]
    WalletRejected(String),

    #[error("Wallet did not respond within {secs}s")]
    SignerTimeout { secs: u64 },

    #[error("Submission failed after {attempts} attempts: {last_error}")]
    SubmissionExhausted { attempts: u32, last_error: String },

    /// Ledger lookup failed before anything was submitted
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Transaction build failed: {0}")]
    Build(#[from] TransactionBuilderError),

    #[error("{0}")]
    UnknownFailure(String),
}

impl TokenCreationError {
    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::WalletNotConnected => "wallet_not_connected",
            Self::WalletAddressMismatch { .. } => "wallet_mismatch",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::AirdropFailed(_) => "airdrop_failed",
            Self::MintAddressExhausted { .. } => "mint_address_exhausted",
            Self::AccountCollision(_) => "account_collision",
            Self::StaleBlockhash(_) => "stale_blockhash",
            Self::WalletRejected(_) => "wallet_rejected",
            Self::SignerTimeout { .. } => "signer_timeout",
            Self::SubmissionExhausted { .. } => "submission_exhausted",
            Self::Ledger(_) => "ledger",
            Self::Build(_) => "build",
            Self::UnknownFailure(_) => "unknown",
        }
    }

    /// Single human-readable message for the caller
    pub fn user_message(&self) -> String {
        let reason = match self {
            Self::InsufficientFunds { required, .. } => format!(
                "Insufficient SOL balance. Please fund your wallet with at least {} SOL for transaction fees.",
                *required as f64 / LAMPORTS_PER_SOL as f64
            ),
            other => other.to_string(),
        };
        format!("Token creation failed: {}", reason)
    }

    /// Whether this class can only arise after an envelope reached the ledger
    pub fn fees_may_have_been_spent(&self) -> bool {
        matches!(
            self,
            Self::SubmissionExhausted { .. } | Self::UnknownFailure(_)
        )
    }

    /// Whether this class is recovered internally and must never reach the caller
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::AccountCollision(_) | Self::StaleBlockhash(_))
    }
}

/// Terminal outcome of one creation request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error}")]
pub struct CreationFailure {
    pub error: TokenCreationError,
    /// Envelopes handed to the ledger before the request stopped
    pub submitted: u32,
}

impl CreationFailure {
    pub fn new(error: TokenCreationError, submitted: u32) -> Self {
        Self { error, submitted }
    }

    pub fn category(&self) -> &'static str {
        self.error.category()
    }

    pub fn user_message(&self) -> String {
        self.error.user_message()
    }

    /// True once any envelope has been submitted, whatever ended the request
    pub fn fees_may_have_been_spent(&self) -> bool {
        self.submitted > 0 || self.error.fees_may_have_been_spent()
    }

    pub fn into_error(self) -> TokenCreationError {
        self.error
    }
}

/// Failures raised before anything is submitted
impl From<TokenCreationError> for CreationFailure {
    fn from(error: TokenCreationError) -> Self {
        Self::new(error, 0)
    }
}
