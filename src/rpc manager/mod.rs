//! Ledger client module
//!
//! The pipeline talks to the ledger only through `LedgerClient`. `SolanaLedger`
//! backs it with the nonblocking RPC client; `MockLedger` scripts responses
//! for tests and dry runs.

use async_trait::async_trait;
use solana_sdk::{
    account::Account, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};

// Submodules
pub mod mock;
pub mod rpc_client;
pub mod rpc_errors;

// Re-exports for convenience
pub use mock::MockLedger;
pub use rpc_client::SolanaLedger;
pub use rpc_errors::LedgerError;

pub use crate::tx_builder::context::BlockReference;

/// Options for raw transaction submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
}

/// Finalized on-ledger record of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedRecord {
    pub slot: u64,
}

/// Request/response contract the pipeline consumes from the ledger
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Balance in lamports
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, LedgerError>;

    /// Request a faucet credit (test networks only)
    async fn request_airdrop(&self, address: &Pubkey, lamports: u64)
        -> Result<Signature, LedgerError>;

    /// Wait for a signature to reach the configured commitment.
    ///
    /// Returns `Ok(false)` when `timeout` elapses first.
    async fn confirm_signature(
        &self,
        signature: &Signature,
        timeout: std::time::Duration,
    ) -> Result<bool, LedgerError>;

    /// Account at `address`, or `None` if absent
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, LedgerError>;

    /// Program-derived address for `seeds` under `program_id`
    fn find_program_address(&self, seeds: &[&[u8]], program_id: &Pubkey) -> (Pubkey, u8);

    async fn get_minimum_balance_for_rent_exemption(&self, size: usize)
        -> Result<u64, LedgerError>;

    async fn get_latest_blockhash(&self) -> Result<BlockReference, LedgerError>;

    /// Submit a signed transaction, returning its fee-payer signature
    async fn send_transaction(
        &self,
        tx: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, LedgerError>;

    /// Wait for `tx` to confirm until the block reference's validity window
    /// closes, returning its fee-payer signature.
    ///
    /// Fails with `LedgerError::TransactionExpired` once the window is passed.
    /// An on-chain failure is classified against `tx`'s instructions.
    async fn confirm_transaction(
        &self,
        tx: &Transaction,
        block: &BlockReference,
    ) -> Result<Signature, LedgerError>;

    /// Finalized record for a signature, or `None` if absent
    async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<FinalizedRecord>, LedgerError>;
}
