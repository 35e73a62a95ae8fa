//! BASECLEAN: spam token and NFT cleanup for EVM wallets
//!
//! Entry point. Loads configuration and `.env`, initialises structured
//! logging and dispatches the CLI subcommand.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

use baseclean::burn::orchestrator::{BurnEvent, BurnOrchestrator, CancelHandle};
use baseclean::burn::sender::{Approver, AutoApprove, EthersSender, TransactionSender};
use baseclean::burn::{BurnFlowContext, BurnItem, BurnSelection, BurnStatus, BurnSummary};
use baseclean::config::AppConfig;
use baseclean::dashboard::{self, DashboardState};
use baseclean::engine::Scanner;
use baseclean::storage::{self, BurnRecord, BurnStats};
use baseclean::types::{parse_address, BaseCleanError, ClassifiedAsset, ScanReport};

#[derive(Parser)]
#[command(name = "baseclean")]
#[command(about = "Find and burn spam tokens and NFTs", version)]
struct Cli {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "baseclean.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an address and classify its holdings
    Scan {
        /// Address to scan
        owner: String,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
        /// Only list assets classified as spam
        #[arg(long)]
        spam_only: bool,
    },
    /// Burn assets held by the configured signer
    Burn {
        /// Select everything classified as spam
        #[arg(long)]
        spam: bool,
        /// ERC-20 contract to burn (repeatable)
        #[arg(long = "token", value_name = "ADDR")]
        tokens: Vec<String>,
        /// NFT to burn as ADDR:ID (repeatable)
        #[arg(long = "nft", value_name = "ADDR:ID")]
        nfts: Vec<String>,
        /// Build and log every transaction without sending
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Ask before signing each item
        #[arg(long)]
        confirm_each: bool,
    },
    /// Show past burns
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Serve the JSON dashboard
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let cfg = AppConfig::load(&cli.config)?;
    info!(chain = %cfg.chain.name, chain_id = cfg.chain.chain_id, "BaseClean starting");

    match cli.command {
        Commands::Scan { owner, json, spam_only } => run_scan(&cfg, &owner, json, spam_only).await,
        Commands::Burn {
            spam,
            tokens,
            nfts,
            dry_run,
            yes,
            confirm_each,
        } => {
            let mut selection = BurnSelection::new();
            for t in &tokens {
                selection.add_token(parse_address(t)?);
            }
            for n in &nfts {
                selection.add_nft_str(n)?;
            }
            run_burn(&cfg, spam, selection, dry_run, yes, confirm_each).await
        }
        Commands::History { limit } => run_history(&cfg, limit),
        Commands::Serve { port } => {
            let state = Arc::new(DashboardState::from_storage(&cfg.storage)?);
            dashboard::serve(state, port.unwrap_or(cfg.dashboard.port)).await
        }
    }
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

async fn run_scan(cfg: &AppConfig, owner: &str, json: bool, spam_only: bool) -> Result<()> {
    let owner = parse_address(owner)?;
    let scanner = Scanner::from_config(cfg)?;
    let mut report = scanner.scan(owner).await?;

    if let Err(e) = storage::save_last_scan(&report, &cfg.storage.last_scan_file) {
        warn!(error = %e, "Failed to save scan report");
    }

    if spam_only {
        report.tokens.retain(|c| c.verdict.is_spam());
        report.nfts.retain(|c| c.verdict.is_spam());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    println!("{report}");
    if !report.tokens.is_empty() {
        println!("\nTokens:");
        report.tokens.iter().for_each(print_asset);
    }
    if !report.nfts.is_empty() {
        println!("\nNFTs:");
        report.nfts.iter().for_each(print_asset);
    }
}

fn print_asset(c: &ClassifiedAsset) {
    let signals: Vec<String> = c.verdict.signals.iter().map(|s| s.to_string()).collect();
    let value = c
        .asset
        .value_usd()
        .map(|v| format!("${v:.2}"))
        .unwrap_or_else(|| "$?".to_string());
    println!(
        "  [{:>10} {:>2}] {:<48} {:>12}  {}",
        c.verdict.level.to_string(),
        c.verdict.score,
        c.asset.label(),
        value,
        signals.join(", ")
    );
    println!("      {}", c.asset.key());
}

// ---------------------------------------------------------------------------
// Burn
// ---------------------------------------------------------------------------

/// Asks on the terminal before every item.
struct TerminalApprover;

#[async_trait]
impl Approver for TerminalApprover {
    async fn approve(&self, item: &BurnItem) -> bool {
        let value = item
            .value_usd
            .map(|v| format!(" (~${v:.2})"))
            .unwrap_or_default();
        prompt_yes_no(format!("Burn {}{value}?", item.label)).await
    }
}

async fn prompt_yes_no(question: String) -> bool {
    tokio::task::spawn_blocking(move || {
        print!("{question} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
    })
    .await
    .unwrap_or(false)
}

fn print_context(ctx: &BurnFlowContext) {
    println!(
        "\nAbout to burn {} token(s) and {} NFT(s) worth about ${:.2} from {:?}",
        ctx.token_count, ctx.nft_count, ctx.total_value_usd, ctx.owner
    );
    println!("Destination: {:?}", ctx.dead_address);
    for item in &ctx.items {
        println!("  {:>3}. {}", item.index + 1, item.label);
    }
    if !ctx.skipped.is_empty() {
        println!("Skipped (nothing to transfer): {}", ctx.skipped.join(", "));
    }
    for w in &ctx.warnings {
        println!("  WARNING: {w}");
    }
}

async fn run_burn(
    cfg: &AppConfig,
    spam: bool,
    mut selection: BurnSelection,
    dry_run: bool,
    yes: bool,
    confirm_each: bool,
) -> Result<()> {
    let rpc_url = AppConfig::resolve_env(&cfg.chain.rpc_url_env)?;
    let private_key = cfg.private_key()?;
    let sender = Arc::new(EthersSender::new(
        &rpc_url,
        &private_key,
        cfg.chain.chain_id,
        cfg.burn.receipt_timeout_secs,
    )?);
    let owner = sender.sender_address();

    // Always burn against a fresh view of the wallet.
    let scanner = Scanner::from_config(cfg)?;
    let report = scanner.scan(owner).await?;
    if let Err(e) = storage::save_last_scan(&report, &cfg.storage.last_scan_file) {
        warn!(error = %e, "Failed to save scan report");
    }

    if spam {
        selection.merge(BurnSelection::all_spam(&report));
    }
    if selection.is_empty() {
        bail!(BaseCleanError::EmptySelection);
    }

    let resolved = selection.resolve(&report)?;
    let ctx = BurnFlowContext::prepare(resolved, owner, &cfg.burn, cfg.spam.high_value_usd)?;
    print_context(&ctx);

    let dry_run = dry_run || cfg.burn.dry_run;
    if !dry_run && !yes && !prompt_yes_no(format!("Send {} transaction(s)?", ctx.items.len())).await {
        println!("Aborted.");
        return Ok(());
    }

    let cancel = CancelHandle::new();
    let approver: Arc<dyn Approver> = if confirm_each && !dry_run {
        Arc::new(TerminalApprover)
    } else {
        Arc::new(AutoApprove)
    };

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling remaining burns");
                cancel.cancel();
            }
        });
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let explorer = cfg.chain.explorer_url.clone();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event, explorer.as_deref());
        }
    });

    let orchestrator = BurnOrchestrator::new(sender, approver, &cfg.burn)
        .with_dry_run(dry_run)
        .with_cancel_handle(cancel)
        .with_events(tx);
    let summary = orchestrator.execute(&ctx).await;
    // Closes the event channel.
    drop(orchestrator);
    let _ = printer.await;

    print_summary(&summary);

    if !dry_run {
        storage::append_burn(
            BurnRecord {
                chain_id: cfg.chain.chain_id,
                summary,
            },
            &cfg.storage.history_file,
            cfg.storage.max_history,
        )
        .context("Failed to record burn history")?;
    }
    Ok(())
}

fn print_event(event: &BurnEvent, explorer: Option<&str>) {
    match event {
        BurnEvent::Started { total, batches } => println!("\nBurning {total} item(s) in {batches} batch(es)"),
        BurnEvent::BatchStarted { batch, items } => println!("Batch {} ({items} item(s))", batch + 1),
        BurnEvent::ItemSubmitted { index, tx_hash } => match explorer {
            Some(url) => println!("  {:>3}. submitted {url}/tx/{tx_hash:?}", index + 1),
            None => println!("  {:>3}. submitted {tx_hash:?}", index + 1),
        },
        BurnEvent::ItemFinished { index, status } => println!("  {:>3}. {status}", index + 1),
        BurnEvent::Finished { .. } => {}
    }
}

fn print_summary(summary: &BurnSummary) {
    println!("\n{summary}");
    for (failure, count) in summary.failures_by_category() {
        println!("  {count} x {failure}");
    }
    for o in summary.outcomes.iter().filter(|o| matches!(o.status, BurnStatus::Failed(_))) {
        if let Some(err) = &o.error {
            println!("  {}: {err}", o.label);
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

fn run_history(cfg: &AppConfig, limit: usize) -> Result<()> {
    let history = storage::load_history(&cfg.storage.history_file)?;
    if history.is_empty() {
        println!("No burns recorded yet.");
        return Ok(());
    }

    for record in history.iter().rev().take(limit) {
        let s = &record.summary;
        println!(
            "{}  chain {}  {:?}  {s}",
            s.finished_at.format("%Y-%m-%d %H:%M"),
            record.chain_id,
            s.owner
        );
    }

    let stats = BurnStats::from_history(&history);
    println!(
        "\n{} run(s), {} item(s) burned, ${:.2} total",
        stats.runs, stats.items_burned, stats.value_burned_usd
    );
    Ok(())
}

/// Initialise the tracing subscriber with env-filter and optional JSON output.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("baseclean=info"));

    let json_logging = std::env::var("BASECLEAN_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
