//! Staking risk data gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   risk sub-scores ──▶ staking ──▶ gateway ──▶ cache store
//!                                      │   (miss)
//!                                      ▼
//!                                 dedup queue ◀── memo
//!                                      │
//!                                      ▼
//!                                 scheduler ──▶ circuit breaker
//!                                      │
//!                                      ▼
//!                                 index client ──▶ external index
//! ```
//!
//! The binary runs the gateway until SIGINT/SIGTERM, logs queue status on
//! an interval, applies historical window changes from the config file live
//! and persists the cache snapshot on exit.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use stake_risk_gateway::config::watcher::{restart_required_changes, ConfigWatcher};
use stake_risk_gateway::config::{load_config, GatewayConfig};
use stake_risk_gateway::lifecycle::{build_gateway, wait_for_signal};
use stake_risk_gateway::observability::{init_logging, metrics};
use stake_risk_gateway::CacheAsideGateway;

#[derive(Parser, Debug)]
#[command(name = "stake-risk-gateway", version, about = "Staking risk data gateway")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Seconds between queue status log lines (0 disables)
    #[arg(long, default_value_t = 30)]
    status_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_exists = args.config.exists();
    let config = if config_exists {
        load_config(&args.config)?
    } else {
        GatewayConfig::default()
    };

    init_logging(&config.observability)?;
    tracing::info!("stake-risk-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    if !config_exists {
        tracing::warn!(path = ?args.config, "Config file not found, using defaults");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let runtime = build_gateway(&config)?;

    let (watcher, mut updates) = ConfigWatcher::new(&args.config);
    // Keep the watcher alive for the whole run.
    let _watcher = if config_exists {
        match watcher.run() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::error!(error = %e, "Config watcher failed to start, hot reload disabled");
                None
            }
        }
    } else {
        None
    };

    let mut status_ticker = match args.status_interval_secs {
        0 => None,
        secs => {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            ticker.tick().await;
            Some(ticker)
        }
    };

    let mut current = config;
    let signal = wait_for_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            res = &mut signal => {
                match res {
                    Ok(sig) => tracing::info!(signal = ?sig, "Shutdown signal received"),
                    Err(e) => tracing::error!(error = %e, "Signal handler failed, shutting down"),
                }
                break;
            }
            _ = next_status_tick(&mut status_ticker) => {
                let status = runtime.gateway.queue_status();
                tracing::info!(
                    queue_size = status.queue_size,
                    active_count = status.active_count,
                    pending_dedup_count = status.pending_dedup_count,
                    failure_count = status.failure_count,
                    circuit_open = status.circuit_open,
                    "Gateway status"
                );
            }
            Some(next) = updates.recv() => {
                apply_reload(&runtime.gateway, &mut current, next);
            }
        }
    }

    runtime.gateway.shutdown().await;
    if let Err(e) = runtime.cache.save_to_file() {
        tracing::error!(error = %e, "Failed to persist cache snapshot");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn next_status_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn apply_reload(gateway: &CacheAsideGateway, current: &mut GatewayConfig, next: GatewayConfig) {
    let restart_only = restart_required_changes(current, &next);
    if !restart_only.is_empty() {
        tracing::warn!(sections = ?restart_only, "Config sections changed that need a restart to apply");
    }

    if current.historical != next.historical {
        match gateway.update_historical_config(next.historical) {
            Ok(_) => current.historical = next.historical,
            Err(e) => tracing::error!(error = %e, "Rejected historical window update"),
        }
    }
}
