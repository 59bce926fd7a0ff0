//! `LedgerClient` backed by the Solana nonblocking RPC client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
};
use solana_rpc_client_api::{
    config::RpcSendTransactionConfig,
    request::{RpcError, RpcResponseErrorData},
};
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::TransactionStatus;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::{BlockReference, FinalizedRecord, LedgerClient, LedgerError, SendOptions};

pub struct SolanaLedger {
    client: Arc<RpcClient>,
    url: String,
    commitment: CommitmentConfig,
    poll_interval: Duration,
}

impl std::fmt::Debug for SolanaLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaLedger")
            .field("url", &self.url)
            .field("commitment", &self.commitment.commitment)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl SolanaLedger {
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig, poll_interval: Duration) -> Self {
        let url = url.into();
        Self {
            client: Arc::new(RpcClient::new_with_commitment(url.clone(), commitment)),
            url,
            commitment,
            poll_interval,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify_send_error(tx: &Transaction, err: ClientError) -> LedgerError {
        if let ClientErrorKind::RpcError(RpcError::RpcResponseError {
            data: RpcResponseErrorData::SendTransactionPreflightFailure(sim),
            ..
        }) = err.kind()
        {
            if let Some(line) = sim
                .logs
                .iter()
                .flatten()
                .find(|line| line.to_lowercase().contains("already in use"))
            {
                return LedgerError::AccountInUse(line.clone());
            }
        }

        match err.get_transaction_error() {
            Some(tx_err) => LedgerError::from_transaction_error(tx, &tx_err),
            None => LedgerError::from_client_error(err),
        }
    }
}

#[async_trait]
impl LedgerClient for SolanaLedger {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        self.client
            .get_balance(address)
            .await
            .map_err(LedgerError::from_client_error)
    }

    async fn request_airdrop(
        &self,
        address: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, LedgerError> {
        self.client
            .request_airdrop(address, lamports)
            .await
            .map_err(LedgerError::from_client_error)
    }

    async fn confirm_signature(
        &self,
        signature: &Signature,
        timeout: Duration,
    ) -> Result<bool, LedgerError> {
        let deadline = Instant::now() + timeout;
        loop {
            let confirmed = self
                .client
                .confirm_transaction_with_commitment(signature, self.commitment)
                .await
                .map_err(LedgerError::from_client_error)?
                .value;
            if confirmed {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, LedgerError> {
        self.client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(LedgerError::from_client_error)
    }

    fn find_program_address(&self, seeds: &[&[u8]], program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(seeds, program_id)
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        size: usize,
    ) -> Result<u64, LedgerError> {
        self.client
            .get_minimum_balance_for_rent_exemption(size)
            .await
            .map_err(LedgerError::from_client_error)
    }

    async fn get_latest_blockhash(&self) -> Result<BlockReference, LedgerError> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(LedgerError::from_client_error)?;
        Ok(BlockReference::new(blockhash, last_valid_block_height))
    }

    async fn send_transaction(
        &self,
        tx: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, LedgerError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            ..Default::default()
        };

        self.client
            .send_transaction_with_config(tx, config)
            .await
            .map_err(|e| Self::classify_send_error(tx, e))
    }

    async fn confirm_transaction(
        &self,
        tx: &Transaction,
        block: &BlockReference,
    ) -> Result<Signature, LedgerError> {
        let signature = tx
            .signatures
            .first()
            .copied()
            .ok_or_else(|| LedgerError::Internal("transaction carries no signature".to_string()))?;
        loop {
            let statuses = self
                .client
                .get_signature_statuses(&[signature])
                .await
                .map_err(LedgerError::from_client_error)?
                .value;

            if let Some(Some(status)) = statuses.into_iter().next() {
                if let Some(err) = status.err.as_ref() {
                    warn!(signature = %signature, error = %err, "Transaction failed on ledger");
                    return Err(LedgerError::from_transaction_error(tx, err));
                }
                if status.satisfies_commitment(self.commitment) {
                    debug!(signature = %signature, slot = status.slot, "Transaction confirmed");
                    return Ok(signature);
                }
            }

            let height = self
                .client
                .get_block_height()
                .await
                .map_err(LedgerError::from_client_error)?;
            if height > block.last_valid_block_height {
                return Err(LedgerError::TransactionExpired(format!(
                    "Transaction {} was not confirmed in time (block height {} > {})",
                    signature, height, block.last_valid_block_height
                )));
            }

            sleep(self.poll_interval).await;
        }
    }

    async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<FinalizedRecord>, LedgerError> {
        let statuses: Vec<Option<TransactionStatus>> = self
            .client
            .get_signature_statuses_with_history(&[*signature])
            .await
            .map_err(LedgerError::from_client_error)?
            .value;

        Ok(statuses.into_iter().next().flatten().and_then(|status| {
            (status.err.is_none() && status.satisfies_commitment(CommitmentConfig::finalized()))
                .then_some(FinalizedRecord { slot: status.slot })
        }))
    }
}
