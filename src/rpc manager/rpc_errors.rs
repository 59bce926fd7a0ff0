use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_sdk::{
    instruction::InstructionError,
    system_program,
    transaction::{Transaction, TransactionError},
};
use thiserror::Error;

/// System program error code for `AccountAlreadyInUse`
const SYSTEM_ACCOUNT_ALREADY_IN_USE: u32 = 0;

/// Ledger client error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request or confirmation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (code: {code:?})")]
    RpcResponse { message: String, code: Option<i64> },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The cited blockhash is unknown to the node
    #[error("Blockhash not found")]
    BlockhashNotFound,

    /// The block reference's validity window passed before confirmation
    #[error("Transaction expired: {0}")]
    TransactionExpired(String),

    /// An identical transaction was already processed
    #[error("Transaction already processed")]
    AlreadyProcessed,

    /// The node is lagging behind the cluster
    #[error("Node is behind: {0}")]
    NodeBehind(String),

    /// An account the transaction creates is already in use
    #[error("Account already in use: {0}")]
    AccountInUse(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Check if a fresh envelope might succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        match self {
            // Retryable errors
            LedgerError::Transport(_) => true,
            LedgerError::Timeout(_) => true,
            LedgerError::RateLimitExceeded(_) => true,
            LedgerError::BlockhashNotFound => true,
            LedgerError::TransactionExpired(_) => true,
            LedgerError::AlreadyProcessed => true,
            LedgerError::NodeBehind(_) => true,

            // Non-retryable errors
            LedgerError::AccountInUse(_) => false,
            LedgerError::InsufficientFunds(_) => false,
            LedgerError::Internal(_) => false,

            // Retry on server errors (5xx)
            LedgerError::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    /// Whether the mint address collided with an existing account
    pub fn is_account_collision(&self) -> bool {
        matches!(self, LedgerError::AccountInUse(_))
    }

    /// Whether the failure stems from an expired or unknown block reference
    pub fn is_stale_blockhash(&self) -> bool {
        matches!(
            self,
            LedgerError::BlockhashNotFound
                | LedgerError::TransactionExpired(_)
                | LedgerError::AlreadyProcessed
        )
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            LedgerError::Transport(_) => "transport",
            LedgerError::Timeout(_) => "timeout",
            LedgerError::RpcResponse { .. } => "rpc_response",
            LedgerError::RateLimitExceeded(_) => "rate_limited",
            LedgerError::BlockhashNotFound => "blockhash_not_found",
            LedgerError::TransactionExpired(_) => "expired",
            LedgerError::AlreadyProcessed => "already_processed",
            LedgerError::NodeBehind(_) => "node_behind",
            LedgerError::AccountInUse(_) => "account_in_use",
            LedgerError::InsufficientFunds(_) => "insufficient_funds",
            LedgerError::Internal(_) => "internal",
        }
    }

    /// Create from ClientError
    pub fn from_client_error(err: ClientError) -> Self {
        match err.kind() {
            ClientErrorKind::Io(e) => LedgerError::Transport(e.to_string()),
            ClientErrorKind::Reqwest(e) if e.is_timeout() => LedgerError::Timeout(e.to_string()),
            ClientErrorKind::Reqwest(e) if e.is_connect() => LedgerError::Transport(e.to_string()),
            _ => Self::from_message(&err.to_string()),
        }
    }

    /// Classify an on-chain failure of `tx`
    ///
    /// `Custom(0)` from a system program instruction is `AccountAlreadyInUse`;
    /// its rendered text carries only the numeric code.
    pub fn from_transaction_error(tx: &Transaction, err: &TransactionError) -> Self {
        if let TransactionError::InstructionError(idx, InstructionError::Custom(code)) = err {
            let program = tx
                .message
                .instructions
                .get(*idx as usize)
                .map(|ix| *ix.program_id(&tx.message.account_keys));
            if *code == SYSTEM_ACCOUNT_ALREADY_IN_USE && program == Some(system_program::id()) {
                return LedgerError::AccountInUse(format!("instruction {}: {}", idx, err));
            }
        }
        Self::from_message(&err.to_string())
    }

    /// Classify a raw failure message by case-insensitive substring
    pub fn from_message(message: &str) -> Self {
        let err_str = message.to_lowercase();

        if err_str.contains("already in use") {
            LedgerError::AccountInUse(message.to_string())
        } else if err_str.contains("already been processed") || err_str.contains("already processed") {
            LedgerError::AlreadyProcessed
        } else if err_str.contains("blockhash not found") {
            LedgerError::BlockhashNotFound
        } else if err_str.contains("not confirmed in time")
            || err_str.contains("block height exceeded")
            || err_str.contains("transaction expired")
        {
            LedgerError::TransactionExpired(message.to_string())
        } else if err_str.contains("node is behind") || err_str.contains("node behind") {
            LedgerError::NodeBehind(message.to_string())
        } else if err_str.contains("rate limit")
            || err_str.contains("too many requests")
            || err_str.contains("429")
        {
            LedgerError::RateLimitExceeded(message.to_string())
        } else if err_str.contains("insufficient funds")
            || err_str.contains("insufficient lamports")
        {
            LedgerError::InsufficientFunds(message.to_string())
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            LedgerError::Timeout(message.to_string())
        } else if err_str.contains("connection refused")
            || err_str.contains("connection reset")
            || err_str.contains("error sending request")
        {
            LedgerError::Transport(message.to_string())
        } else {
            // Extract error code if available
            let code = err_str
                .split("code:")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_end_matches(|c: char| !c.is_ascii_digit()).parse::<i64>().ok());

            LedgerError::RpcResponse {
                message: message.to_string(),
                code,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert!(LedgerError::from_message(
            "Allocate: account Address { address: 7xK.., base: None } already in use"
        )
        .is_account_collision());
        assert_eq!(
            LedgerError::from_message("This transaction has already been processed"),
            LedgerError::AlreadyProcessed
        );
        assert_eq!(
            LedgerError::from_message("Transaction simulation failed: Blockhash not found"),
            LedgerError::BlockhashNotFound
        );
        assert!(matches!(
            LedgerError::from_message("Transaction was not confirmed in time"),
            LedgerError::TransactionExpired(_)
        ));
        assert!(matches!(
            LedgerError::from_message("RPC node is behind by 150 slots"),
            LedgerError::NodeBehind(_)
        ));
        assert!(matches!(
            LedgerError::from_message("HTTP status client error (429 Too Many Requests)"),
            LedgerError::RateLimitExceeded(_)
        ));
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert!(LedgerError::from_message("ACCOUNT ALREADY IN USE").is_account_collision());
        assert_eq!(
            LedgerError::from_message("BLOCKHASH NOT FOUND"),
            LedgerError::BlockhashNotFound
        );
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(LedgerError::Transport("connection failed".to_string()).is_retryable());
        assert!(LedgerError::BlockhashNotFound.is_retryable());
        assert!(LedgerError::AlreadyProcessed.is_retryable());

        assert!(!LedgerError::AccountInUse("x".to_string()).is_retryable());
        assert!(!LedgerError::InsufficientFunds("x".to_string()).is_retryable());
        assert!(!LedgerError::from_message("custom program error: 0x1").is_retryable());
    }

    #[test]
    fn test_rpc_code_extraction() {
        let err = LedgerError::from_message("server error code: 503 service unavailable");
        assert_eq!(
            err,
            LedgerError::RpcResponse {
                message: "server error code: 503 service unavailable".to_string(),
                code: Some(503),
            }
        );
        assert!(err.is_retryable());

        let err = LedgerError::from_message("RPC response error code: -32002, invalid");
        assert!(matches!(err, LedgerError::RpcResponse { code: Some(-32002), .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(LedgerError::BlockhashNotFound.category(), "blockhash_not_found");
        assert_eq!(
            LedgerError::AccountInUse("x".to_string()).category(),
            "account_in_use"
        );
    }

    #[test]
    fn test_executed_collision_needs_the_transaction() {
        use solana_sdk::{hash::Hash, message::Message, pubkey::Pubkey, system_instruction};

        let payer = Pubkey::new_unique();
        let memo = solana_sdk::instruction::Instruction::new_with_bytes(
            Pubkey::new_unique(),
            b"m",
            vec![],
        );
        let create =
            system_instruction::create_account(&payer, &Pubkey::new_unique(), 1, 82, &Pubkey::new_unique());
        let tx = Transaction::new_unsigned(Message::new_with_blockhash(
            &[memo, create],
            Some(&payer),
            &Hash::default(),
        ));
        let err = TransactionError::InstructionError(1, InstructionError::Custom(0));

        // rendered text only carries the numeric code
        assert!(!LedgerError::from_message(&err.to_string()).is_account_collision());
        assert!(LedgerError::from_transaction_error(&tx, &err).is_account_collision());

        let memo_err = TransactionError::InstructionError(0, InstructionError::Custom(0));
        assert!(!LedgerError::from_transaction_error(&tx, &memo_err).is_account_collision());
    }
}
