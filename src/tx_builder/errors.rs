//! Error types for the transaction builder
//!
//! Covers everything between "inputs validated" and "envelope ready to sign":
//! - Instruction payload encoding
//! - Amount scaling and decimal bounds
//! - Blockhash acquisition
//! - Ordering and size checks on the assembled message

use thiserror::Error;

/// Error type for envelope construction and signing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionBuilderError {
    /// `total_supply * 10^decimals` does not fit in 64 bits
    #[error("Amount overflow: supply {total_supply} with {decimals} decimals exceeds u64")]
    AmountOverflow { total_supply: u64, decimals: u8 },

    /// Decimals outside the range the mint program accepts
    #[error("Invalid decimals: {0}")]
    InvalidDecimals(u8),

    /// Failed to fetch a recent blockhash
    #[error("No recent blockhash: {0}")]
    Blockhash(String),

    /// Instructions are not in memo → create-account → initialize → associate → mint order
    #[error("Instruction order violated: {0}")]
    InvalidInstructionOrder(String),

    /// Signature population failed or left a required slot empty
    #[error("Envelope signing failed: {0}")]
    Signing(String),

    /// Invalid builder configuration
    #[error("Invalid builder setup: {0}")]
    Configuration(String),

    /// Serialized transaction is larger than a single packet
    #[error("Transaction too large: {size} bytes (limit {limit})")]
    TransactionTooLarge { size: usize, limit: usize },

    /// Broken invariant inside the builder
    #[error("Builder invariant broken: {0}")]
    Internal(String),
}

impl TransactionBuilderError {
    /// Only a missing block reference can clear up on a fresh attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Blockhash(_))
    }

    /// Label for metrics and log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::AmountOverflow { .. } | Self::InvalidDecimals(_) => "amount",
            Self::Blockhash(_) => "blockhash",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::Signing(_) => "signing",
            Self::Configuration(_) => "config",
            Self::TransactionTooLarge { .. } => "size",
            Self::Internal(_) => "internal",
        }
    }

    pub fn blockhash_unavailable(reason: impl Into<String>) -> Self {
        Self::Blockhash(reason.into())
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    pub fn signing_failed(reason: impl Into<String>) -> Self {
        Self::Signing(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = TransactionBuilderError::AmountOverflow {
            total_supply: 1,
            decimals: 9,
        };
        assert_eq!(
            err.to_string(),
            "Amount overflow: supply 1 with 9 decimals exceeds u64"
        );

        let err = TransactionBuilderError::TransactionTooLarge { size: 1300, limit: 1232 };
        assert_eq!(err.to_string(), "Transaction too large: 1300 bytes (limit 1232)");
    }

    #[test]
    fn test_only_blockhash_retries() {
        assert!(TransactionBuilderError::blockhash_unavailable("node behind").is_retryable());
        assert!(!TransactionBuilderError::signing_failed("slot 1 empty").is_retryable());
        assert!(!TransactionBuilderError::Configuration("no payer".into()).is_retryable());
        assert!(!TransactionBuilderError::TransactionTooLarge { size: 2000, limit: 1232 }
            .is_retryable());
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(TransactionBuilderError::blockhash_unavailable("x").category(), "blockhash");
        assert_eq!(TransactionBuilderError::InvalidDecimals(12).category(), "amount");
        assert_eq!(TransactionBuilderError::internal("size").category(), "internal");
    }

    #[test]
    fn test_constructor_shorthands() {
        let err = TransactionBuilderError::invalid_order("mint_to before initialize_mint");
        assert!(matches!(err, TransactionBuilderError::InvalidInstructionOrder(_)));
        assert_eq!(
            TransactionBuilderError::blockhash_unavailable("rpc down"),
            TransactionBuilderError::Blockhash("rpc down".to_string())
        );
    }
}
