//! Pool Bootstrap CLI
//!
//! Entry point for bootstrapping SPL token-swap pools.
//!
//! ## Commands
//!
//! - **create-pool**: create the state account, vaults, LP mint, LP and fee
//!   accounts, then initialize the pool (`--dry-run` stops after packing)
//! - **derive**: program-derived address and bump for a list of seeds
//! - **watch**: keep the owner's token-account snapshot fresh from
//!   account-change notifications

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pool_bootstrap::config::Config;
use pool_bootstrap::metrics::metrics;
use pool_bootstrap::pool_engine::{PoolBootstrapEngine, PoolBootstrapRequest, SeedLiquidity};
use pool_bootstrap::resolver::{LedgerMintSource, MintInfoSource, StaticMintSource};
use pool_bootstrap::rpc_manager::RpcLedger;
use pool_bootstrap::structured_logging::PipelineContext;
use pool_bootstrap::tx_builder::AddressDeriver;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "POOL_BOOTSTRAP_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap the pool described in the [pool] section
    CreatePool {
        /// Build and pack the transactions without sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Derive a program address (seeds: pubkey:<base58>, str:<text>, hex:<bytes>, base64:<bytes>)
    Derive {
        /// Owning program; defaults to the cluster's swap program
        #[arg(long)]
        program: Option<String>,

        #[arg(long = "seed", required = true)]
        seeds: Vec<String>,
    },

    /// Track the token accounts of an owner until interrupted
    Watch {
        /// Owner to track; defaults to the payer
        #[arg(long)]
        owner: Option<String>,

        /// Notification channel capacity
        #[arg(long, default_value = "16")]
        channel_capacity: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs)?;
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    let outcome = match args.command {
        Command::CreatePool { dry_run } => create_pool(&config, dry_run).await,
        Command::Derive { program, seeds } => derive(&config, program.as_deref(), &seeds),
        Command::Watch {
            owner,
            channel_capacity,
        } => watch(&config, owner.as_deref(), channel_capacity).await,
    };

    if args.print_metrics {
        eprintln!("{}", metrics().render()?);
    }
    outcome
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "pool_bootstrap=debug,info"
    } else {
        "pool_bootstrap=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_target(true)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::load(Some(path)).with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        Config::load(None).context("Invalid configuration")
    }
}

async fn create_pool(config: &Config, dry_run: bool) -> Result<()> {
    let pool = config
        .pool
        .as_ref()
        .context("create-pool needs a [pool] section in the configuration")?;
    let ctx = config.context()?;
    let wallet = config.load_wallet().context("Failed to load payer")?;
    info!(payer = %wallet.pubkey(), endpoint = %ctx.endpoint, cluster = %ctx.cluster, "Payer loaded");

    let ledger = Arc::new(RpcLedger::new(ctx.endpoint.clone(), ctx.commitment));
    let mints: Arc<dyn MintInfoSource> = if config.mints.is_empty() {
        Arc::new(LedgerMintSource::new(ledger.clone(), ctx.program_ids))
    } else {
        Arc::new(StaticMintSource::new(config.mints.iter().copied()))
    };

    let (mint_a, mint_b) = pool.mints()?;
    let request = PoolBootstrapRequest {
        mint_a,
        mint_b,
        fee_owner: pool.fee_owner()?,
        config: pool.swap_pool_config()?,
        pool_mint_decimals: pool.pool_mint_decimals,
        seed_liquidity: pool.seed_liquidity.map(|seed| SeedLiquidity {
            amount_a: seed.amount_a,
            amount_b: seed.amount_b,
        }),
        sequential: pool.sequential,
    };

    let engine = PoolBootstrapEngine::new(ctx, ledger, &wallet, mints).with_limits(config.limits());

    if dry_run {
        let prepared = engine
            .prepare(&request, &PipelineContext::new("create-pool --dry-run"))
            .await?;
        let plans: Vec<serde_json::Value> = prepared
            .plans
            .iter()
            .map(|plan| {
                serde_json::json!({
                    "index": plan.index(),
                    "steps": plan.steps().iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                    "instructions": plan.instructions().len(),
                    "signers": plan.signer_pubkeys().iter().map(|k| k.to_string()).collect::<Vec<_>>(),
                    "depends_on_previous": plan.depends_on_previous(),
                })
            })
            .collect();
        let output = serde_json::json!({ "addresses": prepared.addresses, "plans": plans });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let report = engine.bootstrap(&request).await?;
    let confirmed: Vec<serde_json::Value> = report
        .confirmed
        .iter()
        .map(|plan| {
            serde_json::json!({
                "index": plan.index,
                "steps": plan.steps.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                "signature": plan.signature.to_string(),
            })
        })
        .collect();
    let output = serde_json::json!({ "addresses": report.addresses, "confirmed": confirmed });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn derive(config: &Config, program: Option<&str>, seeds: &[String]) -> Result<()> {
    let program = match program {
        Some(id) => Pubkey::from_str(id).with_context(|| format!("Invalid program id: {}", id))?,
        None => config.context()?.program_ids.token_swap,
    };
    let seed_bytes = seeds
        .iter()
        .map(|seed| parse_seed(seed))
        .collect::<Result<Vec<_>>>()?;
    let seed_refs: Vec<&[u8]> = seed_bytes.iter().map(Vec::as_slice).collect();

    let pda = AddressDeriver::default().derive(&seed_refs, &program)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "address": pda.address.to_string(),
            "bump": pda.bump,
            "program": program.to_string(),
        }))?
    );
    Ok(())
}

/// `pubkey:<base58>`, `str:<utf8>`, `hex:<bytes>` or `base64:<bytes>`
fn parse_seed(seed: &str) -> Result<Vec<u8>> {
    match seed.split_once(':') {
        Some(("pubkey", value)) => Ok(Pubkey::from_str(value)
            .with_context(|| format!("Invalid pubkey seed: {}", value))?
            .to_bytes()
            .to_vec()),
        Some(("str", value)) => Ok(value.as_bytes().to_vec()),
        Some(("hex", value)) => {
            hex::decode(value).with_context(|| format!("Invalid hex seed: {}", value))
        }
        Some(("base64", value)) => base64::engine::general_purpose::STANDARD
            .decode(value)
            .with_context(|| format!("Invalid base64 seed: {}", value)),
        _ => anyhow::bail!(
            "Seed '{}' must be prefixed with pubkey:, str:, hex: or base64:",
            seed
        ),
    }
}

#[cfg(feature = "ws-stream")]
async fn watch(config: &Config, owner: Option<&str>, channel_capacity: usize) -> Result<()> {
    use pool_bootstrap::streaming::websocket_stream::AccountChangeFeed;
    use pool_bootstrap::token_accounts::TokenAccountRefresher;
    use tokio::sync::mpsc;

    let ctx = config.context()?;
    let owner = match owner {
        Some(owner) => Pubkey::from_str(owner).with_context(|| format!("Invalid owner: {}", owner))?,
        None => config.load_wallet().context("Failed to load payer")?.pubkey(),
    };

    let ledger = Arc::new(RpcLedger::new(ctx.endpoint.clone(), ctx.commitment));
    let refresher = Arc::new(TokenAccountRefresher::new(
        ledger,
        owner,
        ctx.program_ids.token_programs(),
    ));
    refresher.request_refresh().await?;

    let feed = AccountChangeFeed::new(config.websocket_url()?, ctx.commitment);
    let client = feed.connect().await?;
    let (tx, rx) = mpsc::channel(channel_capacity.max(1));
    let subscription = feed.subscribe_account(client, owner, tx).await;
    let listener = tokio::spawn(refresher.clone().run_listener(rx));

    let mut report_interval = tokio::time::interval(std::time::Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = report_interval.tick() => {
                if let Some(snapshot) = refresher.snapshot() {
                    info!(
                        owner = %snapshot.owner,
                        lamports = snapshot.lamports,
                        token_accounts = snapshot.accounts.len(),
                        refreshes = refresher.refresh_count(),
                        "Token account snapshot"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    subscription.abort();
    listener.abort();
    Ok(())
}

#[cfg(not(feature = "ws-stream"))]
async fn watch(_config: &Config, _owner: Option<&str>, _channel_capacity: usize) -> Result<()> {
    anyhow::bail!("watch requires the ws-stream feature")
}
