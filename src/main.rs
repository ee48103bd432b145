//! lending-monitor: market yields and liquidation risk for a lending pool.
//!
//! Single-binary Tokio application that:
//! 1. Loads the token universe for the active network
//! 2. Fetches market data on demand, throttled per market
//! 3. Derives deposit/borrow APYs from the rate model
//! 4. Sizes liquidations for a list of accounts

mod config;
mod report;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use common::{Error, LiquidationAccount, MonitorConfig};
use lending_math::{sort_by_risk, SizingConfig};
use market_client::HttpMarketFetcher;
use market_data::{
    new_market_cache, CacheConfig, ConfigTokenCatalog, FetchOrchestrator, LoadOutcome,
    OrchestratorConfig, RefreshMode, RefreshTask,
};

/// Lending pool market and liquidation monitor
#[derive(Parser)]
#[command(name = "lending-monitor", about = "Lending pool market and liquidation monitor")]
struct Cli {
    /// Config file; defaults apply if it does not exist.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the active network.
    #[arg(long)]
    network: Option<String>,

    /// Load every market once, print the table and exit.
    #[arg(long)]
    once: bool,

    /// Print a liquidation risk report for a JSON list of accounts and exit.
    #[arg(long, value_name = "FILE")]
    accounts: Option<PathBuf>,
}

fn build_orchestrator(cfg: &MonitorConfig) -> Result<Arc<FetchOrchestrator>, Error> {
    let fetcher = HttpMarketFetcher::new(&cfg.api)?;
    let catalog = ConfigTokenCatalog::new(cfg.networks.clone());
    let cache = new_market_cache(CacheConfig::from(&cfg.cache));

    Ok(Arc::new(FetchOrchestrator::new(
        cfg.network.clone(),
        &catalog,
        Arc::new(fetcher),
        cache,
        OrchestratorConfig::from(&cfg.fetch),
    )))
}

fn read_accounts(path: &Path) -> Result<Vec<LiquidationAccount>, Error> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn log_outcomes(outcomes: &[(common::MarketKey, LoadOutcome)]) {
    for (key, outcome) in outcomes {
        if *outcome == LoadOutcome::Failed {
            warn!("{}: load failed", key);
        }
    }
}

async fn run_once(cfg: &MonitorConfig, orchestrator: &FetchOrchestrator) {
    let outcomes = orchestrator.load_all_markets().await;
    log_outcomes(&outcomes);
    print!(
        "{}",
        report::render_market_table(&orchestrator.snapshot(), cfg.display.apy_precision)
    );
}

async fn run_accounts(
    cfg: &MonitorConfig,
    orchestrator: &FetchOrchestrator,
    path: &Path,
) -> Result<(), Error> {
    let mut accounts = read_accounts(path)?;
    info!("Loaded {} accounts from {}", accounts.len(), path.display());
    sort_by_risk(&mut accounts);

    // Close factors come from the markets; load them first.
    let outcomes = orchestrator.load_all_markets().await;
    log_outcomes(&outcomes);
    let close_factors: HashMap<String, Option<f64>> = orchestrator
        .keys()
        .iter()
        .filter_map(|k| orchestrator.market_data(k))
        .map(|d| (d.symbol, d.close_factor))
        .collect();

    print!(
        "{}",
        report::render_risk_report(&accounts, &close_factors, &SizingConfig::from(&cfg.risk))
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lending_monitor=info,market_data=info,market_client=info,lending_math=warn".into()
            }),
        )
        .with_target(true)
        .init();

    let cfg = match config::load_config(&cli.config, cli.network.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Network {} via {} (throttle {}s, cache ttl {}s)",
        cfg.network, cfg.api.base_url, cfg.fetch.throttle_secs, cfg.cache.ttl_secs
    );

    let orchestrator = match build_orchestrator(&cfg) {
        Ok(o) => o,
        Err(e) => {
            error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &cli.accounts {
        if let Err(e) = run_accounts(&cfg, &orchestrator, path).await {
            error!("Account report failed: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if cli.once {
        run_once(&cfg, &orchestrator).await;
        return;
    }

    // ── Refresh until shutdown ───────────────────────────────────────
    let refresh = RefreshTask::spawn(
        orchestrator.clone(),
        Duration::from_secs(cfg.fetch.refresh_interval_secs),
        RefreshMode::Throttled,
    );

    let mut table_interval =
        tokio::time::interval(Duration::from_secs(cfg.fetch.refresh_interval_secs));
    table_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick fires immediately, before any data.
    table_interval.tick().await;

    info!("Lending monitor is running. Press Ctrl+C to stop.");
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = table_interval.tick() => {
                print!(
                    "{}",
                    report::render_market_table(&orchestrator.snapshot(), cfg.display.apy_precision)
                );
            }
        }
    }

    refresh.shutdown().await;
    info!("Lending monitor stopped");
}
