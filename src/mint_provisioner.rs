//! Mint identity provisioning and associated-account resolution
//!
//! A `MintBinding` pairs the mint keypair with the associated account derived
//! from it. The pair is only ever replaced as a whole: a new mint always
//! comes with a freshly resolved associated account.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use tracing::{debug, warn};

use crate::errors::TokenCreationError;
use crate::metrics;
use crate::rpc_manager::LedgerClient;
use crate::tx_builder::instructions::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// What to do when the ledger cannot say whether a candidate address is free
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistenceCheckPolicy {
    /// Accept the candidate optimistically
    #[default]
    FailOpen,
    /// Treat the candidate as occupied and generate another
    FailClosed,
}

/// Generates mint keypairs whose address is free on the ledger
pub struct KeypairProvisioner {
    ledger: Arc<dyn LedgerClient>,
    max_attempts: u32,
    policy: ExistenceCheckPolicy,
}

impl KeypairProvisioner {
    pub fn new(ledger: Arc<dyn LedgerClient>, max_attempts: u32, policy: ExistenceCheckPolicy) -> Self {
        Self {
            ledger,
            max_attempts,
            policy,
        }
    }

    /// Generate keypairs until one has no account at its address
    ///
    /// # Errors
    ///
    /// `TokenCreationError::MintAddressExhausted` after `max_attempts` occupied
    /// (or, under `FailClosed`, unverifiable) candidates.
    pub async fn provision(&self) -> Result<Keypair, TokenCreationError> {
        for attempt in 1..=self.max_attempts {
            let candidate = Keypair::new();
            let address = candidate.pubkey();

            match self.ledger.get_account_info(&address).await {
                Ok(None) => {
                    debug!(mint = %address, attempt = attempt, "Mint address is free");
                    return Ok(candidate);
                }
                Ok(Some(_)) => {
                    metrics::record(|m| m.mint_collisions_total.inc());
                    debug!(mint = %address, attempt = attempt, "Mint address occupied, regenerating");
                }
                Err(e) => match self.policy {
                    ExistenceCheckPolicy::FailOpen => {
                        warn!(
                            mint = %address,
                            attempt = attempt,
                            error = %e,
                            "Existence check failed, accepting address"
                        );
                        return Ok(candidate);
                    }
                    ExistenceCheckPolicy::FailClosed => {
                        warn!(
                            mint = %address,
                            attempt = attempt,
                            error = %e,
                            "Existence check failed, regenerating"
                        );
                    }
                },
            }
        }

        Err(TokenCreationError::MintAddressExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Derives associated-account addresses through the ledger client
pub struct AddressResolver {
    ledger: Arc<dyn LedgerClient>,
}

impl AddressResolver {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Associated account of `owner` for `mint`: seeds `[owner, token program, mint]`
    pub fn resolve(&self, owner: &Pubkey, mint: &Pubkey) -> Pubkey {
        let (address, _bump) = self.ledger.find_program_address(
            &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
            &ASSOCIATED_TOKEN_PROGRAM_ID,
        );
        address
    }
}

/// The live mint identity and its associated account
pub struct MintBinding {
    mint: Keypair,
    associated_account: Pubkey,
    generation: u32,
}

impl std::fmt::Debug for MintBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MintBinding")
            .field("mint", &self.mint.pubkey())
            .field("associated_account", &self.associated_account)
            .field("generation", &self.generation)
            .finish()
    }
}

impl MintBinding {
    /// Provision a mint and resolve its associated account in one step
    pub async fn provision(
        provisioner: &KeypairProvisioner,
        resolver: &AddressResolver,
        owner: &Pubkey,
        generation: u32,
    ) -> Result<Self, TokenCreationError> {
        let mint = provisioner.provision().await?;
        let associated_account = resolver.resolve(owner, &mint.pubkey());
        Ok(Self {
            mint,
            associated_account,
            generation,
        })
    }

    /// Replace mint and associated account together, returning the retired mint
    ///
    /// On error the binding is left untouched.
    pub async fn rotate(
        &mut self,
        provisioner: &KeypairProvisioner,
        resolver: &AddressResolver,
        owner: &Pubkey,
    ) -> Result<Pubkey, TokenCreationError> {
        let next = Self::provision(provisioner, resolver, owner, self.generation + 1).await?;
        let retired = self.mint();
        *self = next;
        Ok(retired)
    }

    pub fn mint(&self) -> Pubkey {
        self.mint.pubkey()
    }

    pub fn mint_keypair(&self) -> &Keypair {
        &self.mint
    }

    pub fn associated_account(&self) -> Pubkey {
        self.associated_account
    }

    /// How many bindings preceded this one in the request
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_manager::mock::{ExistenceOutcome, MockLedger, MockLedgerCalls};
    use crate::rpc_manager::LedgerError;

    fn setup(policy: ExistenceCheckPolicy) -> (Arc<MockLedger>, KeypairProvisioner) {
        let ledger = Arc::new(MockLedger::new());
        let provisioner = KeypairProvisioner::new(ledger.clone(), 10, policy);
        (ledger, provisioner)
    }

    #[tokio::test]
    async fn test_regenerates_until_free() {
        let (ledger, provisioner) = setup(ExistenceCheckPolicy::FailOpen);
        ledger.push_existence(ExistenceOutcome::Occupied);
        ledger.push_existence(ExistenceOutcome::Occupied);

        provisioner.provision().await.unwrap();
        assert_eq!(MockLedgerCalls::get(&ledger.calls.get_account_info), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_after_ceiling() {
        let (ledger, provisioner) = setup(ExistenceCheckPolicy::FailOpen);
        for _ in 0..10 {
            ledger.push_existence(ExistenceOutcome::Occupied);
        }

        let err = provisioner.provision().await.unwrap_err();
        assert_eq!(err, TokenCreationError::MintAddressExhausted { attempts: 10 });
        assert_eq!(MockLedgerCalls::get(&ledger.calls.get_account_info), 10);
    }

    #[tokio::test]
    async fn test_fail_open_accepts_unverified_address() {
        let (ledger, provisioner) = setup(ExistenceCheckPolicy::FailOpen);
        ledger.push_existence(ExistenceOutcome::Unanswerable(LedgerError::Timeout(
            "slow node".to_string(),
        )));

        assert!(provisioner.provision().await.is_ok());
        assert_eq!(MockLedgerCalls::get(&ledger.calls.get_account_info), 1);
    }

    #[tokio::test]
    async fn test_fail_closed_regenerates_unverified_address() {
        let (ledger, provisioner) = setup(ExistenceCheckPolicy::FailClosed);
        ledger.push_existence(ExistenceOutcome::Unanswerable(LedgerError::Timeout(
            "slow node".to_string(),
        )));

        assert!(provisioner.provision().await.is_ok());
        assert_eq!(MockLedgerCalls::get(&ledger.calls.get_account_info), 2);
    }

    #[tokio::test]
    async fn test_rotation_replaces_both_halves() {
        let (ledger, provisioner) = setup(ExistenceCheckPolicy::FailOpen);
        let resolver = AddressResolver::new(ledger.clone());
        let owner = Pubkey::new_unique();

        let mut binding = MintBinding::provision(&provisioner, &resolver, &owner, 0).await.unwrap();
        let (old_mint, old_ata) = (binding.mint(), binding.associated_account());

        let retired = binding.rotate(&provisioner, &resolver, &owner).await.unwrap();
        assert_eq!(retired, old_mint);
        assert_ne!(binding.mint(), old_mint);
        assert_ne!(binding.associated_account(), old_ata);
        assert_eq!(binding.generation(), 1);
        assert_eq!(binding.associated_account(), resolver.resolve(&owner, &binding.mint()));
        assert_eq!(MockLedgerCalls::get(&ledger.calls.find_program_address), 3);
    }

    #[tokio::test]
    async fn test_failed_rotation_keeps_binding() {
        let ledger = Arc::new(MockLedger::new());
        let provisioner = KeypairProvisioner::new(ledger.clone(), 1, ExistenceCheckPolicy::FailOpen);
        let resolver = AddressResolver::new(ledger.clone());
        let owner = Pubkey::new_unique();

        let mut binding = MintBinding::provision(&provisioner, &resolver, &owner, 0).await.unwrap();
        let mint = binding.mint();
        ledger.push_existence(ExistenceOutcome::Occupied);

        let err = binding.rotate(&provisioner, &resolver, &owner).await.unwrap_err();
        assert_eq!(err, TokenCreationError::MintAddressExhausted { attempts: 1 });
        assert_eq!(binding.mint(), mint);
        assert_eq!(binding.generation(), 0);
    }

    #[test]
    fn test_policy_serde_names() {
        assert_eq!(
            serde_json::to_string(&ExistenceCheckPolicy::FailClosed).unwrap(),
            "\"fail_closed\""
        );
    }
}
