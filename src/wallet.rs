//! External signer abstraction and wallet selection
//!
//! The pipeline never holds the payer's private key. It hands a partially
//! signed transaction to an `ExternalSigner` and waits for it to come back
//! with the payer signature filled in. Signers may be unavailable, may refuse,
//! and may take arbitrarily long.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Wallet ids in auto-connect priority order
pub const WALLET_PRIORITY: [&str; 3] = ["phantom", "solflare", "backpack"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Wallet not connected")]
    NotConnected,

    /// The user or the signer declined the request
    #[error("Signature request rejected: {0}")]
    Rejected(String),

    #[error("No wallet detected")]
    NoWalletDetected,

    #[error("{0}")]
    ConnectionFailed(String),

    #[error("No public key received from wallet")]
    NoPublicKey,

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),
}

impl WalletError {
    pub fn category(&self) -> &'static str {
        match self {
            WalletError::NotConnected => "not_connected",
            WalletError::Rejected(_) => "rejected",
            WalletError::NoWalletDetected => "no_wallet",
            WalletError::ConnectionFailed(_) => "connection",
            WalletError::NoPublicKey => "no_public_key",
            WalletError::InvalidKeypair(_) => "keypair",
        }
    }
}

/// Whether a signer variant can currently be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletAvailability {
    Available,
    Unavailable,
}

/// Async external signer
#[async_trait]
pub trait ExternalSigner: Send + Sync {
    /// Stable identifier, e.g. `phantom`
    fn id(&self) -> &str;

    /// Display name
    fn name(&self) -> &str;

    fn availability(&self) -> WalletAvailability;

    /// Connected public key, if any
    fn public_key(&self) -> Option<Pubkey>;

    async fn connect(&self) -> Result<Option<Pubkey>, WalletError>;

    /// Fill in this signer's signature on a (possibly partially signed) transaction
    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;
}

/// Set of known signer variants, ordered by auto-connect priority
#[derive(Clone, Default)]
pub struct WalletRegistry {
    wallets: Vec<Arc<dyn ExternalSigner>>,
}

impl WalletRegistry {
    /// Register wallets; known ids are ordered by `WALLET_PRIORITY`, unknown ids keep
    /// their relative order after them
    pub fn new(mut wallets: Vec<Arc<dyn ExternalSigner>>) -> Self {
        wallets.sort_by_key(|w| {
            WALLET_PRIORITY
                .iter()
                .position(|id| *id == w.id())
                .unwrap_or(WALLET_PRIORITY.len())
        });
        Self { wallets }
    }

    /// Available wallets in priority order
    pub fn available_wallets(&self) -> Vec<Arc<dyn ExternalSigner>> {
        self.wallets
            .iter()
            .filter(|w| w.availability() == WalletAvailability::Available)
            .cloned()
            .collect()
    }

    /// Connect the preferred wallet if available, else the first available by priority
    pub async fn auto_connect(
        &self,
        preferred: Option<&str>,
    ) -> Result<(Arc<dyn ExternalSigner>, Pubkey), WalletError> {
        let available = self.available_wallets();
        debug!(
            available = ?available.iter().map(|w| w.id().to_string()).collect::<Vec<_>>(),
            preferred = ?preferred,
            "Detected wallets"
        );

        let chosen = preferred
            .and_then(|id| available.iter().find(|w| w.id() == id))
            .or_else(|| available.first())
            .cloned()
            .ok_or(WalletError::NoWalletDetected)?;

        if let Some(id) = preferred {
            if id != chosen.id() {
                warn!(preferred = id, chosen = chosen.id(), "Preferred wallet unavailable");
            }
        }

        let public_key = chosen
            .connect()
            .await
            .map_err(|e| {
                WalletError::ConnectionFailed(format!("Failed to connect to {}: {}", chosen.name(), e))
            })?
            .ok_or(WalletError::NoPublicKey)?;

        info!(wallet = chosen.id(), pubkey = %public_key, "Wallet connected");
        Ok((chosen, public_key))
    }
}

/// Validate and decode 64 secret-key bytes
fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, WalletError> {
    if bytes.len() != 64 {
        return Err(WalletError::InvalidKeypair(format!(
            "expected 64 bytes, got {}",
            bytes.len()
        )));
    }
    if bytes.iter().all(|&b| b == 0) {
        return Err(WalletError::InvalidKeypair(
            "all-zero key rejected".to_string(),
        ));
    }
    Keypair::try_from(bytes).map_err(|e| WalletError::InvalidKeypair(e.to_string()))
}

/// Keypair-backed signer used where no browser wallet exists
pub struct KeypairWallet {
    id: String,
    keypair: Keypair,
    connected: AtomicBool,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            id: "keypair".to_string(),
            keypair,
            connected: AtomicBool::new(false),
        }
    }

    /// Load from a keypair file (JSON byte array or raw 64 bytes)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        let keypair_bytes = std::fs::read(path).map_err(|e| {
            WalletError::InvalidKeypair(format!("failed to read {}: {}", path.display(), e))
        })?;

        let keypair = if keypair_bytes.len() == 64 {
            keypair_from_bytes(&keypair_bytes)?
        } else {
            let json: Vec<u8> = serde_json::from_slice(&keypair_bytes)
                .map_err(|e| WalletError::InvalidKeypair(format!("failed to parse JSON: {}", e)))?;
            keypair_from_bytes(&json)?
        };

        Ok(Self::new(keypair))
    }

    /// Decode a base58 secret key
    pub fn from_base58(encoded: &str) -> Result<Self, WalletError> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidKeypair(format!("invalid base58: {}", e)))?;
        Ok(Self::new(keypair_from_bytes(&bytes)?))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl ExternalSigner for KeypairWallet {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Local Keypair"
    }

    fn availability(&self) -> WalletAvailability {
        WalletAvailability::Available
    }

    fn public_key(&self) -> Option<Pubkey> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.keypair.pubkey())
    }

    async fn connect(&self) -> Result<Option<Pubkey>, WalletError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(Some(self.keypair.pubkey()))
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(WalletError::NotConnected);
        }
        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Rejected(e.to_string()))?;
        Ok(tx)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// How a `MockWallet` answers signature requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSignBehavior {
    Approve,
    Reject,
    /// Approve the first `n` requests, reject the rest
    ApproveFirst(usize),
}

/// Scriptable signer for tests and dry runs
pub struct MockWallet {
    id: String,
    keypair: Keypair,
    behavior: MockSignBehavior,
    availability: WalletAvailability,
    connected: AtomicBool,
    connect_error: Mutex<Option<String>>,
    withhold_key: AtomicBool,
    sign_delay: Mutex<Option<Duration>>,
    sign_calls: AtomicUsize,
}

impl MockWallet {
    /// Connected signer that approves every request
    pub fn approving(keypair: Keypair) -> Self {
        Self::with_behavior("mock", keypair, MockSignBehavior::Approve)
    }

    /// Connected signer that rejects every request
    pub fn rejecting(keypair: Keypair) -> Self {
        Self::with_behavior("mock", keypair, MockSignBehavior::Reject)
    }

    pub fn with_behavior(id: &str, keypair: Keypair, behavior: MockSignBehavior) -> Self {
        Self {
            id: id.to_string(),
            keypair,
            behavior,
            availability: WalletAvailability::Available,
            connected: AtomicBool::new(true),
            connect_error: Mutex::new(None),
            withhold_key: AtomicBool::new(false),
            sign_delay: Mutex::new(None),
            sign_calls: AtomicUsize::new(0),
        }
    }

    /// Registry entry that is detected but not installed
    pub fn unavailable(id: &str) -> Self {
        let mut wallet = Self::with_behavior(id, Keypair::new(), MockSignBehavior::Approve);
        wallet.availability = WalletAvailability::Unavailable;
        wallet.connected = AtomicBool::new(false);
        wallet
    }

    pub fn disconnected(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    pub fn with_connect_error(self, message: &str) -> Self {
        *self.connect_error.lock() = Some(message.to_string());
        self
    }

    /// `connect()` succeeds but yields no public key
    pub fn withholding_key(self) -> Self {
        self.withhold_key.store(true, Ordering::SeqCst);
        self
    }

    /// Delay every signature response
    pub fn with_sign_delay(self, delay: Duration) -> Self {
        *self.sign_delay.lock() = Some(delay);
        self
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl ExternalSigner for MockWallet {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn availability(&self) -> WalletAvailability {
        self.availability
    }

    fn public_key(&self) -> Option<Pubkey> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.keypair.pubkey())
    }

    async fn connect(&self) -> Result<Option<Pubkey>, WalletError> {
        if let Some(message) = self.connect_error.lock().clone() {
            return Err(WalletError::ConnectionFailed(message));
        }
        self.connected.store(true, Ordering::SeqCst);
        if self.withhold_key.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.keypair.pubkey()))
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        let prior = self.sign_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.sign_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let approve = match self.behavior {
            MockSignBehavior::Approve => true,
            MockSignBehavior::Reject => false,
            MockSignBehavior::ApproveFirst(n) => prior < n,
        };
        if !approve {
            return Err(WalletError::Rejected("User rejected the request.".to_string()));
        }

        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Rejected(e.to_string()))?;
        Ok(tx)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
