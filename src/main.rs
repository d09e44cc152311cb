//! tokensnap - consistent ERC-20 balance snapshots
//!
//! A CLI tool that reads token metadata and balances for many tokens (or
//! many holders) over JSON-RPC and stamps the whole batch with a single
//! block timestamp and block number.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid input, failed lookup, unreachable node, etc.)

mod aggregator;
mod cli;
mod config;
mod error;
mod models;
mod provider;
mod report;

use aggregator::{Aggregator, AggregatorConfig};
use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use error::QueryError;
use indicatif::{ProgressBar, ProgressStyle};
use models::{BlockRef, QueryMode, QueryOutcome, RunMetadata};
use provider::{BlockClock, Erc20LookupProvider, JsonRpcClient, OnChainAggregator, RpcConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("tokensnap v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Query failed: {:#}", e);
            if let Some(identifier) = e
                .downcast_ref::<QueryError>()
                .and_then(QueryError::offending_identifier)
            {
                eprintln!("\n❌ Error: {:#}\n   Offending address: {}", e, identifier);
            } else {
                eprintln!("\n❌ Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .tokensnap.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the RPC endpoint, batch limits and default tokens.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG`, when set, takes precedence over `-v`/`-q`.
fn init_logging(args: &Args) {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete query workflow.
async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let tokens = args.token_list(&config.query.tokens).map_err(|e| anyhow!(e))?;

    let client = Arc::new(
        JsonRpcClient::new(RpcConfig::from(&config.rpc))
            .context("Failed to create JSON-RPC client")?,
    );
    let target = args.block.map(BlockRef::Number).unwrap_or_default();

    if !args.quiet {
        eprintln!("🔗 RPC endpoint: {}", client.url());
        eprintln!("   Mode: {}", args.mode);
        if let Some(contract) = args.contract {
            eprintln!("   Aggregator contract: {}", contract);
        }
        if let Some(block) = args.block {
            eprintln!("   Block: {}", block);
        }
    }

    let count = match args.holders {
        Some(ref holders) if args.mode == QueryMode::Across => holders.len(),
        _ => tokens.len(),
    };
    let spinner = make_spinner(args.quiet, args.mode, count);
    let result = match args.contract {
        Some(contract) => {
            run_on_chain(&args, &config, client.clone(), contract, &tokens, target).await
        }
        None => run_local(&args, &config, client.clone(), &tokens, target).await,
    };
    if let Some(ref pb) = spinner {
        pb.finish_and_clear();
    }
    let outcome = result?;

    let duration = start_time.elapsed().as_secs_f64();
    let metadata = RunMetadata {
        rpc_url: client.url().to_string(),
        contract: args.contract,
        generated_at: Utc::now(),
        duration_seconds: duration,
    };

    // Render the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&outcome)?,
        OutputFormat::Markdown => report::generate_markdown_report(&outcome, &metadata),
    };

    match config.general.output {
        Some(ref path) => {
            report::write_report(&output, std::path::Path::new(path))?;
            if !args.quiet {
                eprintln!("\n✅ Snapshot saved to: {}", path);
            }
        }
        None => println!("{}", output),
    }

    if !args.quiet {
        let observation = outcome.observation();
        eprintln!("\n📊 Snapshot Summary:");
        eprintln!("   Values: {}", outcome.len());
        eprintln!(
            "   Block: {} (timestamp {})",
            observation.sequence, observation.timestamp
        );
        eprintln!("   Duration: {:.1}s", duration);
    }

    Ok(())
}

/// Run the query with per-token lookups fanned out from this process.
async fn run_local(
    args: &Args,
    config: &Config,
    client: Arc<JsonRpcClient>,
    tokens: &[Address],
    target: BlockRef,
) -> Result<QueryOutcome> {
    let mut aggregator_config = AggregatorConfig::from(&config.query);
    // A historical read is only consistent if every lookup uses that block.
    if args.block.is_some() && !aggregator_config.pin_to_block {
        warn!("--block given, pinning lookups to it");
        aggregator_config.pin_to_block = true;
    }

    let aggregator = Aggregator::new(
        Erc20LookupProvider::new(client.clone()),
        BlockClock::new(client, target),
        aggregator_config,
    );

    let outcome = match args.mode {
        QueryMode::Full => {
            let holder = required_holder(args)?;
            QueryOutcome::Batch(aggregator.query_multiple_entities(holder, tokens).await?)
        }
        QueryMode::Balances => {
            let holder = required_holder(args)?;
            QueryOutcome::Balances {
                subject: holder,
                identifiers: tokens.to_vec(),
                result: aggregator.query_balances_only(holder, tokens).await?,
            }
        }
        QueryMode::Single => {
            let holder = required_holder(args)?;
            let token = single_token(tokens)?;
            QueryOutcome::Single(aggregator.query_single_entity(holder, token).await?)
        }
        QueryMode::Across => {
            let token = single_token(tokens)?;
            let subjects = args.holders.clone().unwrap_or_default();
            let result = aggregator.query_across_subjects(&subjects, token).await?;
            QueryOutcome::AcrossSubjects { subjects, result }
        }
    };

    Ok(outcome)
}

/// Run the query in one call to a deployed aggregator contract.
async fn run_on_chain(
    args: &Args,
    config: &Config,
    client: Arc<JsonRpcClient>,
    contract: Address,
    tokens: &[Address],
    target: BlockRef,
) -> Result<QueryOutcome> {
    let aggregator = OnChainAggregator::new(client, contract, config.query.max_batch_size);
    let holder = required_holder(args)?;

    let outcome = match args.mode {
        QueryMode::Full => QueryOutcome::Batch(
            aggregator
                .query_multiple_tokens(holder, tokens, target)
                .await?,
        ),
        QueryMode::Balances => QueryOutcome::Balances {
            subject: holder,
            identifiers: tokens.to_vec(),
            result: aggregator.query_balances(holder, tokens, target).await?,
        },
        QueryMode::Single | QueryMode::Across => {
            return Err(anyhow!("--contract only supports --mode full or --mode balances"));
        }
    };

    Ok(outcome)
}

fn required_holder(args: &Args) -> Result<Address> {
    args.holder
        .ok_or_else(|| anyhow!("--mode {} requires --holder", args.mode))
}

fn single_token(tokens: &[Address]) -> Result<Address> {
    match tokens {
        [token] => Ok(*token),
        _ => Err(QueryError::InvalidInput(format!(
            "expected exactly one token, got {}",
            tokens.len()
        ))
        .into()),
    }
}

/// Spinner shown while lookups are in flight.
fn make_spinner(quiet: bool, mode: QueryMode, count: usize) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        pb.set_style(style);
    }
    let what = if mode == QueryMode::Across { "holders" } else { "tokens" };
    pb.set_message(format!("Querying {} {}...", count, what));
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
