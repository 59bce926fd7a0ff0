//! Scripted in-memory ledger
//!
//! Every response can be queued ahead of time; unscripted calls fall back to
//! the happy path. Call counters let tests assert exactly how many requests
//! the pipeline issued.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    account::Account,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};

use super::{BlockReference, FinalizedRecord, LedgerClient, LedgerError, SendOptions};
use crate::tx_builder::instructions::TOKEN_PROGRAM_ID;

/// Rent-exempt minimum for an 82-byte account on mainnet parameters
pub const MOCK_MINT_RENT_LAMPORTS: u64 = 1_461_600;

/// Validity window handed out with every mock blockhash
const MOCK_BLOCK_WINDOW: u64 = 150;

/// Scripted outcome of one `send_transaction` call
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// Accepted; the signature is returned
    Accept,
    /// Rejected with the given error; nothing lands
    Fail(LedgerError),
    /// The call errors but the transaction lands and finalizes anyway
    LandedWithError(LedgerError),
}

/// Scripted outcome of one `confirm_transaction` call
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    Confirmed,
    Fail(LedgerError),
    /// Landed and failed on chain; classified against the submitted transaction
    ExecutionFailed(TransactionError),
}

/// Scripted outcome of one account existence lookup
#[derive(Debug, Clone)]
pub enum ExistenceOutcome {
    Free,
    Occupied,
    Unanswerable(LedgerError),
}

/// Atomic call counters
#[derive(Debug, Default)]
pub struct MockLedgerCalls {
    pub get_balance: AtomicUsize,
    pub request_airdrop: AtomicUsize,
    pub confirm_signature: AtomicUsize,
    pub get_account_info: AtomicUsize,
    pub find_program_address: AtomicUsize,
    pub get_rent_exemption: AtomicUsize,
    pub get_latest_blockhash: AtomicUsize,
    pub send_transaction: AtomicUsize,
    pub confirm_transaction: AtomicUsize,
    pub get_transaction: AtomicUsize,
}

impl MockLedgerCalls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory `LedgerClient` with scripted responses
#[derive(Debug)]
pub struct MockLedger {
    balance: AtomicU64,
    airdrop_error: Mutex<Option<LedgerError>>,
    airdrop_lands: Mutex<bool>,
    existence: Mutex<VecDeque<ExistenceOutcome>>,
    send_outcomes: Mutex<VecDeque<SendOutcome>>,
    confirm_outcomes: Mutex<VecDeque<ConfirmOutcome>>,
    finalized: Mutex<HashSet<Signature>>,
    sent: Mutex<Vec<Transaction>>,
    block_height: AtomicU64,
    pub calls: MockLedgerCalls,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// Funded ledger where every call succeeds
    pub fn new() -> Self {
        Self {
            balance: AtomicU64::new(10_000_000_000),
            airdrop_error: Mutex::new(None),
            airdrop_lands: Mutex::new(true),
            existence: Mutex::new(VecDeque::new()),
            send_outcomes: Mutex::new(VecDeque::new()),
            confirm_outcomes: Mutex::new(VecDeque::new()),
            finalized: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            block_height: AtomicU64::new(1_000),
            calls: MockLedgerCalls::default(),
        }
    }

    pub fn with_balance(self, lamports: u64) -> Self {
        self.balance.store(lamports, Ordering::SeqCst);
        self
    }

    /// Make the faucet reject airdrop requests
    pub fn with_airdrop_error(self, err: LedgerError) -> Self {
        *self.airdrop_error.lock() = Some(err);
        self
    }

    /// Accept airdrop requests without crediting the balance
    pub fn with_airdrop_not_landing(self) -> Self {
        *self.airdrop_lands.lock() = false;
        self
    }

    pub fn push_existence(&self, outcome: ExistenceOutcome) {
        self.existence.lock().push_back(outcome);
    }

    pub fn push_send(&self, outcome: SendOutcome) {
        self.send_outcomes.lock().push_back(outcome);
    }

    pub fn push_confirm(&self, outcome: Result<(), LedgerError>) {
        self.confirm_outcomes.lock().push_back(match outcome {
            Ok(()) => ConfirmOutcome::Confirmed,
            Err(err) => ConfirmOutcome::Fail(err),
        });
    }

    /// Make the next confirmation report an on-chain execution failure
    pub fn push_execution_failure(&self, err: TransactionError) {
        self.confirm_outcomes.lock().push_back(ConfirmOutcome::ExecutionFailed(err));
    }

    pub fn mark_finalized(&self, signature: Signature) {
        self.finalized.lock().insert(signature);
    }

    pub fn balance(&self) -> u64 {
        self.balance.load(Ordering::SeqCst)
    }

    /// Every transaction handed to `send_transaction`, in order
    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.sent.lock().clone()
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_balance(&self, _address: &Pubkey) -> Result<u64, LedgerError> {
        Self::bump(&self.calls.get_balance);
        Ok(self.balance())
    }

    async fn request_airdrop(
        &self,
        _address: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, LedgerError> {
        Self::bump(&self.calls.request_airdrop);
        if let Some(err) = self.airdrop_error.lock().clone() {
            return Err(err);
        }
        if *self.airdrop_lands.lock() {
            self.balance.fetch_add(lamports, Ordering::SeqCst);
        }
        Ok(Signature::new_unique())
    }

    async fn confirm_signature(
        &self,
        _signature: &Signature,
        _timeout: Duration,
    ) -> Result<bool, LedgerError> {
        Self::bump(&self.calls.confirm_signature);
        Ok(true)
    }

    async fn get_account_info(&self, _address: &Pubkey) -> Result<Option<Account>, LedgerError> {
        Self::bump(&self.calls.get_account_info);
        match self.existence.lock().pop_front() {
            None | Some(ExistenceOutcome::Free) => Ok(None),
            Some(ExistenceOutcome::Occupied) => Ok(Some(Account {
                lamports: MOCK_MINT_RENT_LAMPORTS,
                data: vec![0; 82],
                owner: TOKEN_PROGRAM_ID,
                executable: false,
                rent_epoch: 0,
            })),
            Some(ExistenceOutcome::Unanswerable(err)) => Err(err),
        }
    }

    fn find_program_address(&self, seeds: &[&[u8]], program_id: &Pubkey) -> (Pubkey, u8) {
        Self::bump(&self.calls.find_program_address);
        Pubkey::find_program_address(seeds, program_id)
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        _size: usize,
    ) -> Result<u64, LedgerError> {
        Self::bump(&self.calls.get_rent_exemption);
        Ok(MOCK_MINT_RENT_LAMPORTS)
    }

    async fn get_latest_blockhash(&self) -> Result<BlockReference, LedgerError> {
        Self::bump(&self.calls.get_latest_blockhash);
        let height = self.block_height.fetch_add(1, Ordering::SeqCst);
        Ok(BlockReference::new(Hash::new_unique(), height + MOCK_BLOCK_WINDOW))
    }

    async fn send_transaction(
        &self,
        tx: &Transaction,
        _options: SendOptions,
    ) -> Result<Signature, LedgerError> {
        Self::bump(&self.calls.send_transaction);
        self.sent.lock().push(tx.clone());

        let signature = tx.signatures.first().copied().unwrap_or_default();
        match self.send_outcomes.lock().pop_front() {
            None | Some(SendOutcome::Accept) => Ok(signature),
            Some(SendOutcome::Fail(err)) => Err(err),
            Some(SendOutcome::LandedWithError(err)) => {
                self.finalized.lock().insert(signature);
                Err(err)
            }
        }
    }

    async fn confirm_transaction(
        &self,
        tx: &Transaction,
        _block: &BlockReference,
    ) -> Result<Signature, LedgerError> {
        Self::bump(&self.calls.confirm_transaction);
        let signature = tx.signatures.first().copied().unwrap_or_default();
        let outcome = self.confirm_outcomes.lock().pop_front();
        match outcome {
            None | Some(ConfirmOutcome::Confirmed) => {
                self.finalized.lock().insert(signature);
                Ok(signature)
            }
            Some(ConfirmOutcome::Fail(err)) => Err(err),
            Some(ConfirmOutcome::ExecutionFailed(err)) => {
                Err(LedgerError::from_transaction_error(tx, &err))
            }
        }
    }

    async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<FinalizedRecord>, LedgerError> {
        Self::bump(&self.calls.get_transaction);
        Ok(self
            .finalized
            .lock()
            .contains(signature)
            .then_some(FinalizedRecord { slot: 42 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existence_script_order() {
        let ledger = MockLedger::new();
        ledger.push_existence(ExistenceOutcome::Occupied);
        ledger.push_existence(ExistenceOutcome::Unanswerable(LedgerError::Timeout(
            "slow".to_string(),
        )));

        let addr = Pubkey::new_unique();
        assert!(ledger.get_account_info(&addr).await.unwrap().is_some());
        assert!(ledger.get_account_info(&addr).await.is_err());
        assert!(ledger.get_account_info(&addr).await.unwrap().is_none());
        assert_eq!(MockLedgerCalls::get(&ledger.calls.get_account_info), 3);
    }

    #[tokio::test]
    async fn test_airdrop_credits_balance() {
        let ledger = MockLedger::new().with_balance(0);
        ledger.request_airdrop(&Pubkey::new_unique(), 5).await.unwrap();
        assert_eq!(ledger.balance(), 5);

        let ledger = MockLedger::new().with_balance(0).with_airdrop_not_landing();
        ledger.request_airdrop(&Pubkey::new_unique(), 5).await.unwrap();
        assert_eq!(ledger.balance(), 0);
    }

    #[tokio::test]
    async fn test_blockhashes_are_fresh() {
        let ledger = MockLedger::new();
        let a = ledger.get_latest_blockhash().await.unwrap();
        let b = ledger.get_latest_blockhash().await.unwrap();
        assert_ne!(a.blockhash, b.blockhash);
        assert!(b.last_valid_block_height > a.last_valid_block_height);
    }

    #[tokio::test]
    async fn test_landed_with_error_is_finalized() {
        let ledger = MockLedger::new();
        ledger.push_send(SendOutcome::LandedWithError(LedgerError::Timeout(
            "gateway".to_string(),
        )));

        let mut tx = Transaction::default();
        tx.signatures = vec![Signature::new_unique()];
        let sig = tx.signatures[0];

        assert!(ledger.send_transaction(&tx, SendOptions::default()).await.is_err());
        assert!(ledger.get_transaction(&sig).await.unwrap().is_some());
    }
}
