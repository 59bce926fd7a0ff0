//! Envelope assembly
//!
//! One call to `build_envelope` per submission attempt: it fetches a fresh
//! block reference, draws a new uniqueness memo, plans the five creation
//! instructions and wraps them in an unsigned transaction.

use std::sync::Arc;

use solana_sdk::{
    message::Message, packet::PACKET_DATA_SIZE, pubkey::Pubkey, transaction::Transaction,
};
use tracing::debug;

use crate::observability::TraceContext;
use crate::rpc_manager::LedgerClient;
use crate::tx_builder::context::ExecutionContext;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::{
    plan_token_creation_instructions, sanity_check_ix_order, TokenCreationAccounts,
};
use crate::tx_builder::output::UnsignedEnvelope;

/// Mint parameters fixed for the lifetime of one creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintParameters {
    pub payer: Pubkey,
    pub decimals: u8,
    pub total_supply: u64,
    /// Rent-exempt minimum for the mint account
    pub rent_lamports: u64,
}

pub struct TransactionBuilder {
    ledger: Arc<dyn LedgerClient>,
}

impl TransactionBuilder {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Build an unsigned envelope for `attempt` around `mint`/`associated_account`
    ///
    /// # Errors
    ///
    /// - `Blockhash` when the block reference cannot be fetched (retryable)
    /// - `AmountOverflow` / `InvalidDecimals` for unencodable supplies
    /// - `TransactionTooLarge` if the serialized transaction exceeds one packet
    pub async fn build_envelope(
        &self,
        params: &MintParameters,
        mint: Pubkey,
        associated_account: Pubkey,
        attempt: u32,
        trace: Option<&TraceContext>,
    ) -> Result<UnsignedEnvelope, TransactionBuilderError> {
        let block = self
            .ledger
            .get_latest_blockhash()
            .await
            .map_err(|e| TransactionBuilderError::blockhash_unavailable(e.to_string()))?;

        let context = ExecutionContext::new(
            attempt,
            block,
            trace.map(|t| t.attempt_span(attempt)),
        );
        debug!(context = ?context, "Execution context prepared");

        let accounts = TokenCreationAccounts {
            payer: params.payer,
            mint,
            associated_account,
        };
        let plan = plan_token_creation_instructions(
            &accounts,
            params.decimals,
            params.total_supply,
            params.rent_lamports,
            &context.memo,
        )?;
        sanity_check_ix_order(&plan.instructions)?;

        let message = Message::new_with_blockhash(
            &plan.instructions,
            Some(&params.payer),
            &context.block.blockhash,
        );
        let tx = Transaction::new_unsigned(message);

        let size = serialized_size(&tx)?;
        if size > PACKET_DATA_SIZE {
            return Err(TransactionBuilderError::TransactionTooLarge {
                size,
                limit: PACKET_DATA_SIZE,
            });
        }

        Ok(UnsignedEnvelope::new(
            tx,
            attempt,
            context.block,
            context.memo,
            mint,
            associated_account,
        ))
    }
}

/// Wire size of a transaction, signatures included
pub fn serialized_size(tx: &Transaction) -> Result<usize, TransactionBuilderError> {
    bincode::serialized_size(tx)
        .map(|size| size as usize)
        .map_err(|e| TransactionBuilderError::internal(format!("failed to size transaction: {}", e)))
}
