//! Envelopes produced by the transaction builder
//!
//! An `UnsignedEnvelope` exists for exactly one submission attempt. Signing
//! consumes it and yields a `SignedEnvelope`; a retry discards both and
//! builds a new one around a fresh block reference and memo.

use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::Transaction};

use crate::tx_builder::context::BlockReference;
use crate::tx_builder::errors::TransactionBuilderError;

/// Transaction assembled for one attempt, awaiting signatures
#[derive(Debug, Clone)]
pub struct UnsignedEnvelope {
    /// Transaction with all signature slots still default
    pub tx: Transaction,

    /// Submission attempt this envelope was built for
    pub attempt: u32,

    /// Block reference the message cites
    pub block: BlockReference,

    /// Uniqueness marker carried in the memo instruction
    pub memo: String,

    /// Mint being created
    pub mint: Pubkey,

    /// Associated account receiving the initial supply
    pub associated_account: Pubkey,

    /// List of required signers for this transaction
    /// Extracted from message.header.num_required_signatures
    pub required_signers: Vec<Pubkey>,
}

impl UnsignedEnvelope {
    pub fn new(
        tx: Transaction,
        attempt: u32,
        block: BlockReference,
        memo: String,
        mint: Pubkey,
        associated_account: Pubkey,
    ) -> Self {
        let required_signers = extract_required_signers(&tx);
        Self {
            tx,
            attempt,
            block,
            memo,
            mint,
            associated_account,
            required_signers,
        }
    }

    /// Fee payer (first required signer)
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.required_signers.first()
    }

    pub fn required_signers(&self) -> &[Pubkey] {
        &self.required_signers
    }
}

/// Fully signed transaction ready for submission
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub tx: Transaction,
    pub attempt: u32,
    pub block: BlockReference,
    pub mint: Pubkey,
    pub associated_account: Pubkey,
}

impl SignedEnvelope {
    /// Promote an envelope whose every required signature is present
    ///
    /// # Errors
    ///
    /// `TransactionBuilderError::Signing` if any required slot is still empty.
    pub fn from_signed(
        unsigned: UnsignedEnvelope,
        tx: Transaction,
    ) -> Result<Self, TransactionBuilderError> {
        if tx.message != unsigned.tx.message {
            return Err(TransactionBuilderError::signing_failed(
                "signer returned a transaction with a different message",
            ));
        }
        if !tx.is_signed() {
            let missing: Vec<String> = unsigned
                .required_signers
                .iter()
                .zip(tx.signatures.iter())
                .filter(|(_, sig)| **sig == Signature::default())
                .map(|(key, _)| key.to_string())
                .collect();
            return Err(TransactionBuilderError::signing_failed(format!(
                "missing signatures for: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            tx,
            attempt: unsigned.attempt,
            block: unsigned.block,
            mint: unsigned.mint,
            associated_account: unsigned.associated_account,
        })
    }

    /// Fee-payer signature, which identifies the transaction on the ledger
    pub fn signature(&self) -> Signature {
        self.tx.signatures.first().copied().unwrap_or_default()
    }

    pub fn into_tx(self) -> Transaction {
        self.tx
    }
}

fn extract_required_signers(tx: &Transaction) -> Vec<Pubkey> {
    let count = tx.message.header.num_required_signatures as usize;
    tx.message.account_keys.iter().take(count).copied().collect()
}
