//! Top-level token creation pipeline
//!
//! `create_token` runs one request start to finish: input validation, signer
//! check, funding, rent lookup, mint provisioning and the submission engine.
//! The result is all-or-nothing; no partial `TokenResult` is ever produced.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use tracing::{info, instrument};

use crate::balance_guard::BalanceGuard;
use crate::config::CreationConfig;
use crate::errors::{CreationFailure, TokenCreationError};
use crate::metrics::{self, Timer};
use crate::mint_provisioner::{AddressResolver, KeypairProvisioner, MintBinding};
use crate::observability::{CorrelationId, TraceContext};
use crate::rpc_manager::LedgerClient;
use crate::structured_logging::StructuredLogger;
use crate::submission::{RetrySettings, SubmissionRetryEngine};
use crate::tx_builder::instructions::MINT_ACCOUNT_SIZE;
use crate::tx_builder::MintParameters;
use crate::types::{Network, TokenCreationData, TokenResult};
use crate::wallet::ExternalSigner;

pub struct TokenCreator {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn ExternalSigner>,
    network: Network,
    config: CreationConfig,
}

impl TokenCreator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn ExternalSigner>,
        network: Network,
        config: CreationConfig,
    ) -> Self {
        Self {
            ledger,
            signer,
            network,
            config,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Create a token whose entire supply is minted to `wallet_address`
    ///
    /// `wallet_address` pays every fee and holds mint and freeze authority.
    /// A failure reports how many envelopes were submitted before it.
    #[instrument(skip(self, data), fields(symbol = %data.symbol, network = %self.network))]
    pub async fn create_token(
        &self,
        data: &TokenCreationData,
        wallet_address: &Pubkey,
    ) -> Result<TokenResult, CreationFailure> {
        let correlation_id = CorrelationId::new();
        let logger = StructuredLogger::new(correlation_id.clone());
        let trace = TraceContext::with_correlation("create_token", correlation_id);
        let timer = Timer::new();
        metrics::record(|m| m.token_creations_total.inc());

        match self.run(data, wallet_address, &logger, &trace).await {
            Ok(result) => {
                metrics::record(|m| {
                    m.token_creations_success.inc();
                    timer.observe_duration(&m.token_creation_latency);
                });
                Ok(result)
            }
            Err(e) => {
                metrics::record(|m| {
                    m.token_creations_failed.inc();
                    timer.observe_duration(&m.token_creation_latency);
                });
                logger.log_failure(e.category(), &e.to_string(), timer.elapsed_ms());
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        data: &TokenCreationData,
        wallet_address: &Pubkey,
        logger: &StructuredLogger,
        trace: &TraceContext,
    ) -> Result<TokenResult, CreationFailure> {
        let timer = Timer::new();
        data.validate()?;
        self.check_signer(wallet_address)?;

        let guard = BalanceGuard::new(
            self.ledger.clone(),
            self.network,
            self.config.min_balance_lamports,
            self.config.airdrop_lamports,
            Duration::from_secs(self.config.airdrop_confirm_timeout_secs),
        );
        guard.ensure_funded(wallet_address, logger).await?;

        let rent_lamports = self
            .ledger
            .get_minimum_balance_for_rent_exemption(MINT_ACCOUNT_SIZE as usize)
            .await
            .map_err(TokenCreationError::from)?;

        let provisioner = KeypairProvisioner::new(
            self.ledger.clone(),
            self.config.max_mint_generation_attempts,
            self.config.existence_check_policy,
        );
        let resolver = AddressResolver::new(self.ledger.clone());
        let binding = MintBinding::provision(&provisioner, &resolver, wallet_address, 0).await?;
        logger.log_mint_provisioned(&binding.mint(), &binding.associated_account(), binding.generation());

        let params = MintParameters {
            payer: *wallet_address,
            decimals: data.decimals,
            total_supply: data.total_supply,
            rent_lamports,
        };
        let engine = SubmissionRetryEngine::new(
            self.ledger.clone(),
            self.signer.clone(),
            provisioner,
            RetrySettings::from(&self.config),
        );
        let outcome = engine.run(binding, &params, logger, Some(trace)).await?;

        let mint = outcome.binding.mint();
        logger.log_success(&mint, &outcome.signature, outcome.submissions(), timer.elapsed_ms());
        let result = TokenResult::new(&mint, data, &outcome.signature, self.network);
        info!("🎉 Token {} created at {}", data.symbol, result.explorer_url);
        Ok(result)
    }

    fn check_signer(&self, wallet_address: &Pubkey) -> Result<(), TokenCreationError> {
        match self.signer.public_key() {
            None => Err(TokenCreationError::WalletNotConnected),
            Some(actual) if actual != *wallet_address => {
                Err(TokenCreationError::WalletAddressMismatch {
                    expected: *wallet_address,
                    actual,
                })
            }
            Some(_) => Ok(()),
        }
    }
}
