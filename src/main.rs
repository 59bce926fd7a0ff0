//! token-forge command line front end
//!
//! Creates one SPL token per invocation: loads configuration, connects the
//! local keypair wallet, runs the creation pipeline and prints the
//! `TokenResult` as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_forge::config::Config;
use token_forge::metrics;
use token_forge::rpc_manager::{LedgerClient, MockLedger, SolanaLedger};
use token_forge::wallet::{ExternalSigner, KeypairWallet, WalletRegistry};
use token_forge::{Network, TokenCreationData, TokenCreator, TokenMetadata};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Token name
    #[arg(long)]
    name: String,

    /// Token symbol (uppercase letters and digits)
    #[arg(long)]
    symbol: String,

    #[arg(long, default_value_t = 9)]
    decimals: u8,

    /// Whole tokens to mint
    #[arg(long)]
    supply: u64,

    /// Override the configured network (devnet or mainnet)
    #[arg(long, env = "TOKEN_FORGE_NETWORK")]
    network: Option<Network>,

    /// Override the configured keypair path
    #[arg(long, env = "TOKEN_FORGE_KEYPAIR")]
    keypair: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    image: Option<String>,

    #[arg(long)]
    website: Option<String>,

    /// Run against an in-memory ledger; nothing is sent
    #[arg(long)]
    dry_run: bool,

    /// Write Prometheus metrics to this file when done
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(args.verbose, args.json_logs || config.monitoring.json_logs) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: Config) -> Result<ExitCode> {
    info!("🚀 token-forge v{}", env!("CARGO_PKG_VERSION"));

    let network = config.network.network;
    let ledger: Arc<dyn LedgerClient> = if args.dry_run {
        warn!("🧪 Dry run: using in-memory ledger");
        Arc::new(MockLedger::new())
    } else {
        let url = config.network.rpc_url();
        info!("🌐 Network: {} ({})", network, url);
        Arc::new(SolanaLedger::new(
            url,
            config.network.commitment_config()?,
            Duration::from_millis(config.creation.confirm_poll_interval_ms),
        ))
    };

    let keypair_path = expand_home(&config.wallet.keypair_path);
    info!("🔑 Loading keypair from: {}", keypair_path.display());
    let wallet = KeypairWallet::from_file(&keypair_path)
        .with_context(|| format!("Failed to load keypair {}", keypair_path.display()))?;

    let registry = WalletRegistry::new(vec![Arc::new(wallet) as Arc<dyn ExternalSigner>]);
    let (signer, wallet_address) = registry
        .auto_connect(config.wallet.preferred_wallet.as_deref())
        .await
        .context("Wallet connection failed")?;
    info!("💼 Wallet address: {}", wallet_address);

    let data = TokenCreationData::new(args.name, args.symbol, args.decimals, args.supply)
        .with_metadata(TokenMetadata {
            description: args.description,
            image: args.image,
            website: args.website,
            ..TokenMetadata::default()
        });

    let creator = TokenCreator::new(ledger, signer.clone(), network, config.creation.clone());
    let outcome = creator.create_token(&data, &wallet_address).await;

    if let Err(e) = signer.disconnect().await {
        warn!("Wallet disconnect failed: {}", e);
    }

    if config.monitoring.enable_metrics {
        if let Some(path) = &args.metrics_out {
            export_metrics(path)?;
        }
    }

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            if e.fees_may_have_been_spent() {
                eprintln!(
                    "Note: {} transaction(s) were submitted to the ledger; network fees may have been charged.",
                    e.submitted.max(1)
                );
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "token_forge=debug,info"
    } else {
        "token_forge=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults, then apply CLI overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file_with_env(&args.config)
            .with_context(|| format!("Failed to load config from {}", args.config))?
    } else {
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config
    };

    if let Some(network) = args.network {
        config.network.network = network;
    }
    if let Some(path) = &args.keypair {
        config.wallet.keypair_path = path.clone();
    }
    config.validate()?;
    Ok(config)
}

fn export_metrics(path: &PathBuf) -> Result<()> {
    let Some(m) = metrics::metrics() else {
        warn!("Metrics registry unavailable, skipping export");
        return Ok(());
    };
    let text = m.export_text()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    info!("📊 Metrics written to {}", path.display());
    Ok(())
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}
