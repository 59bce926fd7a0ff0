//! Payer funding check with optional faucet top-up

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::errors::TokenCreationError;
use crate::metrics;
use crate::rpc_manager::LedgerClient;
use crate::structured_logging::StructuredLogger;
use crate::types::Network;

pub struct BalanceGuard {
    ledger: Arc<dyn LedgerClient>,
    network: Network,
    min_balance_lamports: u64,
    airdrop_lamports: u64,
    airdrop_confirm_timeout: Duration,
}

impl BalanceGuard {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        network: Network,
        min_balance_lamports: u64,
        airdrop_lamports: u64,
        airdrop_confirm_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            network,
            min_balance_lamports,
            airdrop_lamports,
            airdrop_confirm_timeout,
        }
    }

    /// Ensure `payer` holds at least the fee/rent threshold
    ///
    /// Below threshold on a faucet network, one airdrop is requested and its
    /// confirmation awaited. Returns the balance that satisfied the check.
    pub async fn ensure_funded(
        &self,
        payer: &Pubkey,
        logger: &StructuredLogger,
    ) -> Result<u64, TokenCreationError> {
        let balance = self.ledger.get_balance(payer).await?;
        logger.log_balance_check(payer, balance, self.min_balance_lamports);

        if balance >= self.min_balance_lamports {
            return Ok(balance);
        }

        if !self.network.has_faucet() {
            return Err(self.insufficient(balance, None));
        }

        info!(
            payer = %payer,
            balance = balance,
            lamports = self.airdrop_lamports,
            "Balance below threshold, requesting airdrop"
        );
        metrics::record(|m| m.airdrops_requested_total.inc());

        let signature = match self.ledger.request_airdrop(payer, self.airdrop_lamports).await {
            Ok(sig) => sig,
            Err(e) => {
                warn!(payer = %payer, error = %e, "Airdrop request failed");
                logger.log_airdrop(payer, self.airdrop_lamports, false);
                return Err(self.insufficient(balance, Some(e.to_string())));
            }
        };

        let confirmed = self
            .ledger
            .confirm_signature(&signature, self.airdrop_confirm_timeout)
            .await
            .map_err(|e| TokenCreationError::AirdropFailed(e.to_string()))?;
        logger.log_airdrop(payer, self.airdrop_lamports, confirmed);

        if !confirmed {
            return Err(TokenCreationError::AirdropFailed(format!(
                "airdrop {} not confirmed within {}s",
                signature,
                self.airdrop_confirm_timeout.as_secs()
            )));
        }

        let balance = self.ledger.get_balance(payer).await?;
        logger.log_balance_check(payer, balance, self.min_balance_lamports);
        if balance < self.min_balance_lamports {
            return Err(TokenCreationError::AirdropFailed(format!(
                "balance still {} lamports after airdrop",
                balance
            )));
        }

        Ok(balance)
    }

    fn insufficient(&self, available: u64, faucet_error: Option<String>) -> TokenCreationError {
        TokenCreationError::InsufficientFunds {
            required: self.min_balance_lamports,
            available: Some(available),
            faucet_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::CorrelationId;
    use crate::rpc_manager::mock::{MockLedger, MockLedgerCalls};
    use crate::rpc_manager::LedgerError;

    const MIN: u64 = 10_000_000;

    fn guard(ledger: Arc<MockLedger>, network: Network) -> BalanceGuard {
        BalanceGuard::new(ledger, network, MIN, 1_000_000_000, Duration::from_secs(5))
    }

    fn logger() -> StructuredLogger {
        StructuredLogger::new(CorrelationId::new())
    }

    #[tokio::test]
    async fn test_funded_payer_passes_without_airdrop() {
        let ledger = Arc::new(MockLedger::new().with_balance(MIN));
        let balance = guard(ledger.clone(), Network::Devnet)
            .ensure_funded(&Pubkey::new_unique(), &logger())
            .await
            .unwrap();

        assert_eq!(balance, MIN);
        assert_eq!(MockLedgerCalls::get(&ledger.calls.request_airdrop), 0);
    }

    #[tokio::test]
    async fn test_devnet_airdrop_tops_up() {
        let ledger = Arc::new(MockLedger::new().with_balance(0));
        let balance = guard(ledger.clone(), Network::Devnet)
            .ensure_funded(&Pubkey::new_unique(), &logger())
            .await
            .unwrap();

        assert_eq!(balance, 1_000_000_000);
        assert_eq!(MockLedgerCalls::get(&ledger.calls.request_airdrop), 1);
        assert_eq!(MockLedgerCalls::get(&ledger.calls.confirm_signature), 1);
    }

    #[tokio::test]
    async fn test_mainnet_fails_immediately() {
        let ledger = Arc::new(MockLedger::new().with_balance(5));
        let err = guard(ledger.clone(), Network::Mainnet)
            .ensure_funded(&Pubkey::new_unique(), &logger())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TokenCreationError::InsufficientFunds {
                required: MIN,
                available: Some(5),
                faucet_error: None
            }
        );
        assert_eq!(MockLedgerCalls::get(&ledger.calls.request_airdrop), 0);
    }

    #[tokio::test]
    async fn test_faucet_failure_is_insufficient_funds() {
        let ledger = Arc::new(
            MockLedger::new()
                .with_balance(0)
                .with_airdrop_error(LedgerError::RateLimitExceeded("airdrop limit".to_string())),
        );
        let err = guard(ledger, Network::Devnet)
            .ensure_funded(&Pubkey::new_unique(), &logger())
            .await
            .unwrap_err();

        match err {
            TokenCreationError::InsufficientFunds { faucet_error: Some(msg), .. } => {
                assert!(msg.contains("airdrop limit"));
            }
            other => panic!("Expected InsufficientFunds, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_airdrop_that_never_lands() {
        let ledger = Arc::new(MockLedger::new().with_balance(0).with_airdrop_not_landing());
        let err = guard(ledger, Network::Devnet)
            .ensure_funded(&Pubkey::new_unique(), &logger())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenCreationError::AirdropFailed(_)));
    }

    #[tokio::test]
    async fn test_idempotent_when_funded() {
        let ledger = Arc::new(MockLedger::new());
        let guard = guard(ledger.clone(), Network::Devnet);
        let payer = Pubkey::new_unique();
        guard.ensure_funded(&payer, &logger()).await.unwrap();
        guard.ensure_funded(&payer, &logger()).await.unwrap();
        assert_eq!(MockLedgerCalls::get(&ledger.calls.get_balance), 2);
    }
}
