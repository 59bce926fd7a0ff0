//! Submission retry engine
//!
//! Drives one creation request from its first envelope to a finalized
//! signature. Each step builds a fresh envelope, has it signed, submits it and
//! waits for confirmation. Failures are classified into three buckets:
//!
//! - account collision: the mint address is taken, so the binding is rotated
//!   and the same attempt ordinal is rebuilt around the new mint
//! - transient (stale block reference, duplicate, lagging node, rate limit,
//!   transport): rebuild with a fresh block reference and memo, next ordinal
//! - anything else: terminal
//!
//! A terminal failure is returned as a `CreationFailure` carrying the number
//! of envelopes already handed to the ledger.
//!
//! Before classifying, the engine asks the ledger whether the envelope's
//! signature finalized anyway. A hit is a success.
//!
//! State is threaded through the loop as an owned accumulator; nothing here
//! is shared between requests.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};
use tracing::{debug, warn};

use crate::config::CreationConfig;
use crate::errors::{CreationFailure, TokenCreationError};
use crate::metrics;
use crate::mint_provisioner::{AddressResolver, KeypairProvisioner, MintBinding};
use crate::observability::TraceContext;
use crate::rpc_manager::{LedgerClient, LedgerError, SendOptions};
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::{serialized_size, MintParameters, SigningCoordinator, TransactionBuilder};
use crate::wallet::ExternalSigner;

/// Retry ceilings and pacing for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Submission attempts before `SubmissionExhausted`
    pub max_retries: u32,
    /// Mint rotations before `MintAddressExhausted`
    pub max_collision_retries: u32,
    /// Fixed delay before every resubmission
    pub backoff: Duration,
    pub signer_timeout: Option<Duration>,
    pub skip_preflight: bool,
    /// Reported as the requirement when the ledger rejects for lack of funds
    pub min_balance_lamports: u64,
}

impl RetrySettings {
    /// Whether a transient failure on `attempt` (0-based) leaves room for another
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_retries
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::from(&CreationConfig::default())
    }
}

impl From<&CreationConfig> for RetrySettings {
    fn from(config: &CreationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_collision_retries: config.max_collision_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            signer_timeout: config.signer_timeout_secs.map(Duration::from_secs),
            skip_preflight: config.skip_preflight,
            min_balance_lamports: config.min_balance_lamports,
        }
    }
}

/// Position of the engine in its state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// About to build and submit attempt `n` (0-based)
    Attempting(u32),
    Success(Signature),
    Failed(TokenCreationError),
}

/// How one submitted envelope ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Confirmed(Signature),
    /// Submission reported failure but the signature finalized
    Recovered { signature: Signature, slot: u64 },
    Rejected(TokenCreationError),
}

/// Record of one envelope handed to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionAttempt {
    pub attempt: u32,
    pub mint: Pubkey,
    pub blockhash: Hash,
    pub outcome: AttemptOutcome,
}

/// Successful end of the engine
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub signature: Signature,
    /// Binding that was live when the envelope finalized
    pub binding: MintBinding,
    pub history: Vec<SubmissionAttempt>,
}

impl SubmissionOutcome {
    /// Envelopes submitted, including rebuilt collision attempts
    pub fn submissions(&self) -> u32 {
        self.history.len() as u32
    }
}

/// Values carried from one step to the next
#[derive(Debug)]
struct RetryAccumulator {
    binding: MintBinding,
    attempt: u32,
    collisions: u32,
    history: Vec<SubmissionAttempt>,
}

impl RetryAccumulator {
    fn new(binding: MintBinding) -> Self {
        Self {
            binding,
            attempt: 0,
            collisions: 0,
            history: Vec::new(),
        }
    }

    fn record(&mut self, blockhash: Hash, outcome: AttemptOutcome) {
        self.history.push(SubmissionAttempt {
            attempt: self.attempt,
            mint: self.binding.mint(),
            blockhash,
            outcome,
        });
    }
}

pub struct SubmissionRetryEngine {
    ledger: Arc<dyn LedgerClient>,
    builder: TransactionBuilder,
    signing: SigningCoordinator,
    provisioner: KeypairProvisioner,
    resolver: AddressResolver,
    settings: RetrySettings,
}

impl SubmissionRetryEngine {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn ExternalSigner>,
        provisioner: KeypairProvisioner,
        settings: RetrySettings,
    ) -> Self {
        Self {
            builder: TransactionBuilder::new(ledger.clone()),
            signing: SigningCoordinator::new(signer, settings.signer_timeout),
            resolver: AddressResolver::new(ledger.clone()),
            ledger,
            provisioner,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    /// Run the state machine until `Success` or `Failed`
    pub async fn run(
        &self,
        binding: MintBinding,
        params: &MintParameters,
        logger: &StructuredLogger,
        trace: Option<&TraceContext>,
    ) -> Result<SubmissionOutcome, CreationFailure> {
        let mut acc = RetryAccumulator::new(binding);
        loop {
            let (state, next) = self.step(acc, params, logger, trace).await;
            acc = next;
            match state {
                AttemptState::Attempting(n) => {
                    debug!(attempt = n, collisions = acc.collisions, "Resubmitting");
                    tokio::time::sleep(self.settings.backoff).await;
                }
                AttemptState::Success(signature) => {
                    return Ok(SubmissionOutcome {
                        signature,
                        binding: acc.binding,
                        history: acc.history,
                    });
                }
                AttemptState::Failed(err) => {
                    return Err(CreationFailure::new(err, acc.history.len() as u32));
                }
            }
        }
    }

    /// Build, sign, submit and confirm the envelope for `acc.attempt`
    async fn step(
        &self,
        mut acc: RetryAccumulator,
        params: &MintParameters,
        logger: &StructuredLogger,
        trace: Option<&TraceContext>,
    ) -> (AttemptState, RetryAccumulator) {
        let attempt = acc.attempt;

        let envelope = match self
            .builder
            .build_envelope(
                params,
                acc.binding.mint(),
                acc.binding.associated_account(),
                attempt,
                trace,
            )
            .await
        {
            Ok(envelope) => envelope,
            Err(e) if e.is_retryable() => {
                let err = LedgerError::Transport(e.to_string());
                return self.classify(acc, err, params, logger).await;
            }
            Err(e) => return (AttemptState::Failed(e.into()), acc),
        };
        logger.log_envelope_built(
            attempt,
            &envelope.mint,
            &envelope.memo,
            serialized_size(&envelope.tx).unwrap_or_default(),
        );

        // Signer failures are terminal: nothing has reached the ledger yet
        let signed = match self
            .signing
            .sign(envelope, acc.binding.mint_keypair(), logger)
            .await
        {
            Ok(signed) => signed,
            Err(e) => return (AttemptState::Failed(e), acc),
        };

        metrics::record(|m| m.submission_attempts_total.inc());
        let options = SendOptions {
            skip_preflight: self.settings.skip_preflight,
        };
        let result = match self.ledger.send_transaction(&signed.tx, options).await {
            Ok(_) => {
                self.ledger
                    .confirm_transaction(&signed.tx, &signed.block)
                    .await
            }
            Err(e) => Err(e),
        };

        let blockhash = signed.block.blockhash;
        match result {
            Ok(signature) => {
                acc.record(blockhash, AttemptOutcome::Confirmed(signature));
                (AttemptState::Success(signature), acc)
            }
            Err(err) => {
                let signature = signed.signature();
                match self.ledger.get_transaction(&signature).await {
                    Ok(Some(record)) => {
                        metrics::record(|m| m.ambiguous_recoveries_total.inc());
                        logger.log_ambiguous_recovery(attempt, &signature, record.slot);
                        acc.record(
                            blockhash,
                            AttemptOutcome::Recovered {
                                signature,
                                slot: record.slot,
                            },
                        );
                        return (AttemptState::Success(signature), acc);
                    }
                    Ok(None) => {}
                    Err(probe) => {
                        warn!(signature = %signature, error = %probe, "Finality probe failed");
                    }
                }

                let rejected = if err.is_account_collision() {
                    TokenCreationError::AccountCollision(err.to_string())
                } else if err.is_retryable() {
                    TokenCreationError::StaleBlockhash(err.to_string())
                } else {
                    self.terminal_error(&err)
                };
                acc.record(blockhash, AttemptOutcome::Rejected(rejected));
                self.classify(acc, err, params, logger).await
            }
        }
    }

    /// Decide the next state after a failed attempt
    async fn classify(
        &self,
        mut acc: RetryAccumulator,
        err: LedgerError,
        params: &MintParameters,
        logger: &StructuredLogger,
    ) -> (AttemptState, RetryAccumulator) {
        let attempt = acc.attempt;

        if err.is_account_collision() {
            acc.collisions += 1;
            metrics::record(|m| m.mint_collisions_total.inc());
            logger.log_attempt_failed(attempt, acc.collisions, "account_collision", &err.to_string());

            if acc.collisions > self.settings.max_collision_retries {
                return (
                    AttemptState::Failed(TokenCreationError::MintAddressExhausted {
                        attempts: acc.collisions,
                    }),
                    acc,
                );
            }

            return match acc
                .binding
                .rotate(&self.provisioner, &self.resolver, &params.payer)
                .await
            {
                Ok(retired) => {
                    logger.log_collision_rotation(&retired, &acc.binding.mint(), acc.collisions);
                    (AttemptState::Attempting(attempt), acc)
                }
                Err(e) => (AttemptState::Failed(e), acc),
            };
        }

        if err.is_retryable() {
            logger.log_attempt_failed(attempt, acc.collisions, err.category(), &err.to_string());

            if !self.settings.should_retry(attempt) {
                return (
                    AttemptState::Failed(TokenCreationError::SubmissionExhausted {
                        attempts: attempt + 1,
                        last_error: err.to_string(),
                    }),
                    acc,
                );
            }

            if err.is_stale_blockhash() {
                metrics::record(|m| m.stale_blockhash_retries_total.inc());
            }
            acc.attempt = attempt + 1;
            return (AttemptState::Attempting(acc.attempt), acc);
        }

        logger.log_attempt_failed(attempt, acc.collisions, err.category(), &err.to_string());
        (AttemptState::Failed(self.terminal_error(&err)), acc)
    }

    /// Public error for a ledger failure that ends the request
    fn terminal_error(&self, err: &LedgerError) -> TokenCreationError {
        match err {
            LedgerError::InsufficientFunds(_) => TokenCreationError::InsufficientFunds {
                required: self.settings.min_balance_lamports,
                available: None,
                faucet_error: None,
            },
            other => TokenCreationError::UnknownFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mint_provisioner::ExistenceCheckPolicy;
    use crate::observability::CorrelationId;
    use crate::rpc_manager::mock::{MockLedger, MockLedgerCalls, SendOutcome, MOCK_MINT_RENT_LAMPORTS};
    use crate::wallet::MockWallet;
    use solana_sdk::{
        instruction::InstructionError, signature::Keypair, transaction::TransactionError,
    };

    struct Harness {
        ledger: Arc<MockLedger>,
        wallet: Arc<MockWallet>,
        engine: SubmissionRetryEngine,
        params: MintParameters,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_settings(RetrySettings {
                backoff: Duration::ZERO,
                ..RetrySettings::default()
            })
        }

        fn with_settings(settings: RetrySettings) -> Self {
            let ledger = Arc::new(MockLedger::new());
            let wallet = Arc::new(MockWallet::approving(Keypair::new()));
            let provisioner =
                KeypairProvisioner::new(ledger.clone(), 10, ExistenceCheckPolicy::FailOpen);
            let engine =
                SubmissionRetryEngine::new(ledger.clone(), wallet.clone(), provisioner, settings);
            let params = MintParameters {
                payer: wallet.pubkey(),
                decimals: 9,
                total_supply: 1_000_000,
                rent_lamports: MOCK_MINT_RENT_LAMPORTS,
            };
            Self {
                ledger,
                wallet,
                engine,
                params,
            }
        }

        async fn binding(&self) -> MintBinding {
            MintBinding::provision(
                &self.engine.provisioner,
                &self.engine.resolver,
                &self.params.payer,
                0,
            )
            .await
            .unwrap()
        }

        async fn run(&self) -> Result<SubmissionOutcome, CreationFailure> {
            let binding = self.binding().await;
            let logger = StructuredLogger::new(CorrelationId::new());
            self.engine.run(binding, &self.params, &logger, None).await
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let h = Harness::new();
        let outcome = h.run().await.unwrap();

        assert_eq!(outcome.submissions(), 1);
        assert_eq!(outcome.history[0].outcome, AttemptOutcome::Confirmed(outcome.signature));
        assert_eq!(MockLedgerCalls::get(&h.ledger.calls.get_transaction), 0);
        assert_eq!(h.wallet.sign_calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let h = Harness::new();
        h.ledger.push_send(SendOutcome::Fail(LedgerError::BlockhashNotFound));

        let outcome = h.run().await.unwrap();
        assert_eq!(outcome.submissions(), 2);
        assert_eq!(outcome.history[1].attempt, 1);
        assert_ne!(outcome.history[0].blockhash, outcome.history[1].blockhash);
        // same mint across transient retries
        assert_eq!(outcome.history[0].mint, outcome.history[1].mint);
    }

    #[tokio::test]
    async fn test_ceiling_is_exact() {
        let h = Harness::new();
        for _ in 0..5 {
            h.ledger.push_send(SendOutcome::Fail(LedgerError::NodeBehind("lag".to_string())));
        }

        let err = h.run().await.unwrap_err();
        assert!(matches!(err.error, TokenCreationError::SubmissionExhausted { attempts: 3, .. }));
        assert_eq!(err.submitted, 3);
        assert!(err.fees_may_have_been_spent());
        assert_eq!(MockLedgerCalls::get(&h.ledger.calls.send_transaction), 3);
    }

    #[tokio::test]
    async fn test_collision_rotates_without_consuming_attempt() {
        let h = Harness::new();
        h.ledger.push_send(SendOutcome::Fail(LedgerError::AccountInUse(
            "account already in use".to_string(),
        )));

        let outcome = h.run().await.unwrap();
        assert_eq!(outcome.submissions(), 2);
        assert_eq!(outcome.history[0].attempt, 0);
        assert_eq!(outcome.history[1].attempt, 0);
        assert_ne!(outcome.history[0].mint, outcome.binding.mint());
        assert_eq!(outcome.binding.generation(), 1);
    }

    #[tokio::test]
    async fn test_collision_ceiling() {
        let h = Harness::new();
        for _ in 0..4 {
            h.ledger.push_send(SendOutcome::Fail(LedgerError::AccountInUse("in use".to_string())));
        }

        let err = h.run().await.unwrap_err();
        assert_eq!(err.error, TokenCreationError::MintAddressExhausted { attempts: 4 });
        assert_eq!(err.submitted, 4);
        assert!(err.fees_may_have_been_spent());
        assert_eq!(MockLedgerCalls::get(&h.ledger.calls.send_transaction), 4);
    }

    #[tokio::test]
    async fn test_confirmation_expiry_is_retried() {
        let h = Harness::new();
        h.ledger.push_confirm(Err(LedgerError::TransactionExpired(
            "block height exceeded".to_string(),
        )));

        let outcome = h.run().await.unwrap();
        assert_eq!(outcome.submissions(), 2);
        assert_eq!(MockLedgerCalls::get(&h.ledger.calls.confirm_transaction), 2);
        assert_eq!(MockLedgerCalls::get(&h.ledger.calls.get_transaction), 1);
    }

    #[tokio::test]
    async fn test_landed_despite_error_is_success() {
        let h = Harness::new();
        h.ledger.push_send(SendOutcome::LandedWithError(LedgerError::Timeout(
            "gateway timeout".to_string(),
        )));

        let outcome = h.run().await.unwrap();
        assert_eq!(outcome.submissions(), 1);
        assert!(matches!(
            outcome.history[0].outcome,
            AttemptOutcome::Recovered { slot: 42, .. }
        ));
        assert_eq!(
            outcome.signature,
            h.ledger.sent_transactions()[0].signatures[0]
        );
        assert_eq!(MockLedgerCalls::get(&h.ledger.calls.send_transaction), 1);
    }

    #[tokio::test]
    async fn test_unclassified_failure_is_terminal() {
        let h = Harness::new();
        h.ledger.push_send(SendOutcome::Fail(LedgerError::from_message(
            "custom program error: 0x1",
        )));

        let err = h.run().await.unwrap_err();
        assert!(matches!(err.error, TokenCreationError::UnknownFailure(_)));
        assert_eq!(MockLedgerCalls::get(&h.ledger.calls.send_transaction), 1);
    }

    #[tokio::test]
    async fn test_executed_collision_rotates_mint() {
        let h = Harness::with_settings(RetrySettings {
            backoff: Duration::ZERO,
            skip_preflight: true,
            ..RetrySettings::default()
        });
        // create_account for the mint is instruction 1, after the memo
        h.ledger.push_execution_failure(TransactionError::InstructionError(
            1,
            InstructionError::Custom(0),
        ));

        let outcome = h.run().await.unwrap();
        assert_eq!(outcome.submissions(), 2);
        assert!(matches!(
            outcome.history[0].outcome,
            AttemptOutcome::Rejected(TokenCreationError::AccountCollision(_))
        ));
        assert_ne!(outcome.history[0].mint, outcome.binding.mint());
        assert_eq!(outcome.binding.generation(), 1);
        assert_eq!(MockLedgerCalls::get(&h.ledger.calls.find_program_address), 2);
    }

    #[tokio::test]
    async fn test_executed_failure_elsewhere_is_terminal() {
        let h = Harness::new();
        // mint_to failing with a token program error is not a collision
        h.ledger.push_execution_failure(TransactionError::InstructionError(
            4,
            InstructionError::Custom(0),
        ));

        let err = h.run().await.unwrap_err();
        assert!(matches!(err.error, TokenCreationError::UnknownFailure(_)));
        assert_eq!(err.submitted, 1);
        assert!(err.fees_may_have_been_spent());
    }

    #[tokio::test]
    async fn test_ledger_reported_shortfall_is_insufficient_funds() {
        let h = Harness::new();
        h.ledger.push_send(SendOutcome::Fail(LedgerError::from_message(
            "Transaction simulation failed: Attempt to debit an account but found no record of a prior credit. insufficient funds for fee",
        )));

        let err = h.run().await.unwrap_err();
        assert_eq!(
            err.error,
            TokenCreationError::InsufficientFunds {
                required: CreationConfig::default().min_balance_lamports,
                available: None,
                faucet_error: None,
            }
        );
        assert!(err.user_message().contains("at least 0.01 SOL"));
        assert_eq!(MockLedgerCalls::get(&h.ledger.calls.send_transaction), 1);
    }

    #[test]
    fn test_settings_from_config() {
        let config = CreationConfig {
            signer_timeout_secs: Some(90),
            retry_backoff_ms: 250,
            ..CreationConfig::default()
        };
        let settings = RetrySettings::from(&config);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.backoff, Duration::from_millis(250));
        assert_eq!(settings.signer_timeout, Some(Duration::from_secs(90)));
        assert!(settings.should_retry(1));
        assert!(!settings.should_retry(2));
    }
}
