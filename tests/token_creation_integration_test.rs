//! End-to-end token creation against the in-memory ledger
//!
//! This test validates:
//! - Happy path result fields and explorer URL
//! - Signer rejection: nothing submitted, no retries
//! - Mint collision recovery with a different mint
//! - Wallet connection and address checks
//! - Funding failures on networks with and without a faucet

use std::sync::Arc;

use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use token_forge::config::CreationConfig;
use token_forge::rpc_manager::mock::{MockLedgerCalls, SendOutcome};
use token_forge::rpc_manager::{LedgerError, MockLedger};
use token_forge::{MockWallet, Network, TokenCreationData, TokenCreationError, TokenCreator};

fn config() -> CreationConfig {
    CreationConfig {
        retry_backoff_ms: 0,
        ..CreationConfig::default()
    }
}

fn creator(ledger: &Arc<MockLedger>, wallet: &Arc<MockWallet>, network: Network) -> TokenCreator {
    TokenCreator::new(ledger.clone(), wallet.clone(), network, config())
}

fn my_token() -> TokenCreationData {
    TokenCreationData::new("My Token", "MAT", 9, 1_000_000)
}

#[tokio::test]
async fn test_happy_path_devnet() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::approving(Keypair::new()));

    let result = creator(&ledger, &wallet, Network::Devnet)
        .create_token(&my_token(), &wallet.pubkey())
        .await
        .unwrap();

    assert_eq!(result.decimals, 9);
    assert_eq!(result.total_supply, 1_000_000);
    assert_eq!(result.token_name, "My Token");
    assert_eq!(result.token_symbol, "MAT");
    assert_eq!(result.network, Network::Devnet);

    let mint: Pubkey = result.mint_address.parse().expect("well-formed mint address");
    assert_eq!(
        result.explorer_url,
        format!("https://explorer.solana.com/address/{}?cluster=devnet", mint)
    );

    let sent = ledger.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(result.transaction_signature, sent[0].signatures[0].to_string());
    assert!(sent[0].verify().is_ok());
    assert_eq!(wallet.sign_calls(), 1);
}

#[tokio::test]
async fn test_mainnet_explorer_url_has_no_cluster() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::approving(Keypair::new()));

    let result = creator(&ledger, &wallet, Network::Mainnet)
        .create_token(&my_token(), &wallet.pubkey())
        .await
        .unwrap();

    assert_eq!(
        result.explorer_url,
        format!("https://explorer.solana.com/address/{}", result.mint_address)
    );
}

#[tokio::test]
async fn test_signer_rejection_submits_nothing() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::rejecting(Keypair::new()));

    let err = creator(&ledger, &wallet, Network::Devnet)
        .create_token(&my_token(), &wallet.pubkey())
        .await
        .unwrap_err();

    assert!(matches!(err.error, TokenCreationError::WalletRejected(_)));
    assert_eq!(err.submitted, 0);
    assert!(!err.fees_may_have_been_spent());
    assert_eq!(MockLedgerCalls::get(&ledger.calls.send_transaction), 0);
    assert_eq!(MockLedgerCalls::get(&ledger.calls.get_latest_blockhash), 1);
    assert_eq!(wallet.sign_calls(), 1);
}

#[tokio::test]
async fn test_collision_yields_different_mint() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::approving(Keypair::new()));
    ledger.push_send(SendOutcome::Fail(LedgerError::from_message(
        "Allocate: account Address { address: 7xKX.., base: None } already in use",
    )));

    let result = creator(&ledger, &wallet, Network::Devnet)
        .create_token(&my_token(), &wallet.pubkey())
        .await
        .unwrap();

    let sent = ledger.sent_transactions();
    assert_eq!(sent.len(), 2);

    // second required signer is the mint
    let first_mint = sent[0].message.account_keys[1];
    let final_mint = sent[1].message.account_keys[1];
    assert_ne!(first_mint, final_mint);
    assert_eq!(result.mint_address, final_mint.to_string());
    assert_ne!(sent[0].message.account_keys, sent[1].message.account_keys);
}

#[tokio::test]
async fn test_disconnected_wallet() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::approving(Keypair::new()).disconnected());

    let err = creator(&ledger, &wallet, Network::Devnet)
        .create_token(&my_token(), &wallet.pubkey())
        .await
        .unwrap_err();

    assert_eq!(err.error, TokenCreationError::WalletNotConnected);
    assert_eq!(wallet.sign_calls(), 0);
}

#[tokio::test]
async fn test_wallet_address_mismatch() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::approving(Keypair::new()));
    let requested = Pubkey::new_unique();

    let err = creator(&ledger, &wallet, Network::Devnet)
        .create_token(&my_token(), &requested)
        .await
        .unwrap_err();

    assert_eq!(
        err.error,
        TokenCreationError::WalletAddressMismatch {
            expected: requested,
            actual: wallet.pubkey(),
        }
    );
    assert_eq!(MockLedgerCalls::get(&ledger.calls.get_balance), 0);
}

#[tokio::test]
async fn test_unfunded_mainnet_payer() {
    let ledger = Arc::new(MockLedger::new().with_balance(1_000));
    let wallet = Arc::new(MockWallet::approving(Keypair::new()));

    let err = creator(&ledger, &wallet, Network::Mainnet)
        .create_token(&my_token(), &wallet.pubkey())
        .await
        .unwrap_err();

    assert!(matches!(
        err.error,
        TokenCreationError::InsufficientFunds { available: Some(1_000), .. }
    ));
    assert_eq!(
        err.user_message(),
        "Token creation failed: Insufficient SOL balance. Please fund your wallet with at least 0.01 SOL for transaction fees."
    );
    assert_eq!(MockLedgerCalls::get(&ledger.calls.request_airdrop), 0);
    assert_eq!(MockLedgerCalls::get(&ledger.calls.send_transaction), 0);
}

#[tokio::test]
async fn test_unfunded_devnet_payer_is_airdropped() {
    let ledger = Arc::new(MockLedger::new().with_balance(0));
    let wallet = Arc::new(MockWallet::approving(Keypair::new()));

    creator(&ledger, &wallet, Network::Devnet)
        .create_token(&my_token(), &wallet.pubkey())
        .await
        .unwrap();

    assert_eq!(MockLedgerCalls::get(&ledger.calls.request_airdrop), 1);
    assert_eq!(ledger.balance(), 1_000_000_000);
}

#[tokio::test]
async fn test_oversized_supply_rejected_before_any_call() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::approving(Keypair::new()));
    let data = TokenCreationData::new("Huge", "HUGE", 9, 1_000_000_000_001);

    let err = creator(&ledger, &wallet, Network::Devnet)
        .create_token(&data, &wallet.pubkey())
        .await
        .unwrap_err();

    assert!(matches!(err.error, TokenCreationError::InvalidInput(_)));
    assert_eq!(MockLedgerCalls::get(&ledger.calls.get_balance), 0);
}
