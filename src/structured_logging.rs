//! Structured pipeline events
//!
//! One `StructuredLogger` per creation request, keyed by its correlation id.
//! Events only record what happened; nothing reads them back.

use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::observability::CorrelationId;

/// Structured logger for token creation events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    correlation_id: CorrelationId,
}

impl StructuredLogger {
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self { correlation_id }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn log_balance_check(&self, payer: &Pubkey, balance: u64, required: u64) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            payer = %payer,
            balance = balance,
            required = required,
            "Balance checked"
        );
    }

    pub fn log_airdrop(&self, payer: &Pubkey, lamports: u64, confirmed: bool) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            payer = %payer,
            lamports = lamports,
            confirmed = confirmed,
            "Faucet credit requested"
        );
    }

    pub fn log_mint_provisioned(&self, mint: &Pubkey, associated_account: &Pubkey, generation: u32) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            mint = %mint,
            associated_account = %associated_account,
            generation = generation,
            "Mint identity provisioned"
        );
    }

    pub fn log_envelope_built(&self, attempt: u32, mint: &Pubkey, memo: &str, size: usize) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            attempt = attempt,
            mint = %mint,
            memo = %memo,
            size = size,
            "Envelope built"
        );
    }

    pub fn log_signer_round_trip(&self, attempt: u32, wait_ms: u64, approved: bool) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            attempt = attempt,
            wait_ms = wait_ms,
            approved = approved,
            "Signer responded"
        );
    }

    pub fn log_attempt_failed(&self, attempt: u32, collisions: u32, failure_class: &str, error: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            attempt = attempt,
            collisions = collisions,
            failure_class = %failure_class,
            error = %error,
            "Submission attempt failed"
        );
    }

    pub fn log_collision_rotation(&self, old_mint: &Pubkey, new_mint: &Pubkey, collisions: u32) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            old_mint = %old_mint,
            mint = %new_mint,
            collisions = collisions,
            "Mint address in use, rotated identity"
        );
    }

    pub fn log_ambiguous_recovery(&self, attempt: u32, signature: &Signature, slot: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            attempt = attempt,
            signature = %signature,
            slot = slot,
            "Failed submission found finalized on ledger"
        );
    }

    pub fn log_success(&self, mint: &Pubkey, signature: &Signature, attempts: u32, latency_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            mint = %mint,
            signature = %signature,
            attempts = attempts,
            latency_ms = latency_ms,
            "Token created"
        );
    }

    pub fn log_failure(&self, failure_class: &str, error: &str, latency_ms: u64) {
        tracing::error!(
            correlation_id = %self.correlation_id,
            failure_class = %failure_class,
            error = %error,
            latency_ms = latency_ms,
            "Token creation failed"
        );
    }
}
