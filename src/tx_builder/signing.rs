//! Local partial signature plus external counter-signature
//!
//! The mint keypair signs first because the mint account is being created
//! and must authorize its own allocation. The envelope then goes to the
//! external signer for the fee-payer signature.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::Keypair;
use tracing::debug;

use crate::errors::TokenCreationError;
use crate::metrics::{self, Timer};
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::output::{SignedEnvelope, UnsignedEnvelope};
use crate::wallet::{ExternalSigner, WalletError};

pub struct SigningCoordinator {
    signer: Arc<dyn ExternalSigner>,
    /// Upper bound on the external signer wait; `None` waits indefinitely
    timeout: Option<Duration>,
}

impl SigningCoordinator {
    pub fn new(signer: Arc<dyn ExternalSigner>, timeout: Option<Duration>) -> Self {
        Self { signer, timeout }
    }

    /// Partially sign with `mint`, then obtain the external signature
    ///
    /// # Errors
    ///
    /// - `WalletRejected` when the signer declines
    /// - `WalletNotConnected` when the signer has no session
    /// - `SignerTimeout` when a configured deadline passes
    /// - `Build(Signing)` if a required signature is still missing afterwards
    pub async fn sign(
        &self,
        envelope: UnsignedEnvelope,
        mint: &Keypair,
        logger: &StructuredLogger,
    ) -> Result<SignedEnvelope, TokenCreationError> {
        let mut tx = envelope.tx.clone();
        tx.try_partial_sign(&[mint], envelope.block.blockhash)
            .map_err(|e| TransactionBuilderError::signing_failed(format!("mint signature: {}", e)))?;
        debug!(attempt = envelope.attempt, mint = %envelope.mint, "Mint partial signature applied");

        let timer = Timer::new();
        let request = self.signer.sign_transaction(tx);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| TokenCreationError::SignerTimeout {
                    secs: limit.as_secs(),
                })?,
            None => request.await,
        };
        metrics::record(|m| timer.observe_duration(&m.signer_wait));
        logger.log_signer_round_trip(envelope.attempt, timer.elapsed_ms(), result.is_ok());

        let signed = result.map_err(|e| match e {
            WalletError::NotConnected => TokenCreationError::WalletNotConnected,
            other => TokenCreationError::WalletRejected(other.to_string()),
        })?;

        Ok(SignedEnvelope::from_signed(envelope, signed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::CorrelationId;
    use crate::rpc_manager::mock::MockLedger;
    use crate::tx_builder::builder::{MintParameters, TransactionBuilder};
    use crate::wallet::MockWallet;
    use solana_sdk::{
        pubkey::Pubkey,
        signature::{Signature, Signer},
    };

    async fn envelope(payer: Pubkey, mint: Pubkey) -> UnsignedEnvelope {
        let builder = TransactionBuilder::new(Arc::new(MockLedger::new()));
        let params = MintParameters {
            payer,
            decimals: 6,
            total_supply: 1_000,
            rent_lamports: 1_461_600,
        };
        builder
            .build_envelope(&params, mint, Pubkey::new_unique(), 0, None)
            .await
            .unwrap()
    }

    fn logger() -> StructuredLogger {
        StructuredLogger::new(CorrelationId::new())
    }

    #[tokio::test]
    async fn test_both_signatures_present() {
        let wallet = Arc::new(MockWallet::approving(Keypair::new()));
        let mint = Keypair::new();
        let unsigned = envelope(wallet.pubkey(), mint.pubkey()).await;

        let coordinator = SigningCoordinator::new(wallet.clone(), None);
        let signed = coordinator.sign(unsigned, &mint, &logger()).await.unwrap();

        assert!(signed.tx.is_signed());
        assert!(signed.tx.signatures.iter().all(|s| *s != Signature::default()));
        assert!(signed.tx.verify().is_ok());
        assert_eq!(wallet.sign_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejection_maps_to_wallet_rejected() {
        let wallet = Arc::new(MockWallet::rejecting(Keypair::new()));
        let mint = Keypair::new();
        let unsigned = envelope(wallet.pubkey(), mint.pubkey()).await;

        let err = SigningCoordinator::new(wallet, None)
            .sign(unsigned, &mint, &logger())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenCreationError::WalletRejected(_)));
    }

    #[tokio::test]
    async fn test_wrong_payer_leaves_signature_missing() {
        let wallet = Arc::new(MockWallet::approving(Keypair::new()));
        let mint = Keypair::new();
        // envelope names a payer the wallet cannot sign for
        let unsigned = envelope(Pubkey::new_unique(), mint.pubkey()).await;

        let err = SigningCoordinator::new(wallet, None)
            .sign(unsigned, &mint, &logger())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenCreationError::WalletRejected(_) | TokenCreationError::Build(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_timeout() {
        let wallet = Arc::new(
            MockWallet::approving(Keypair::new()).with_sign_delay(Duration::from_secs(600)),
        );
        let mint = Keypair::new();
        let unsigned = envelope(wallet.pubkey(), mint.pubkey()).await;

        let err = SigningCoordinator::new(wallet, Some(Duration::from_secs(30)))
            .sign(unsigned, &mint, &logger())
            .await
            .unwrap_err();
        assert_eq!(err, TokenCreationError::SignerTimeout { secs: 30 });
    }
}
