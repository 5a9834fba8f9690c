//! Wallet engine daemon.

use clap::Parser;
use std::path::PathBuf;

use wallet_engine::config::{load_config, EngineConfig};
use wallet_engine::observability::{init_logging, metrics};
use wallet_engine::Engine;

#[derive(Parser)]
#[command(name = "wallet-engine")]
#[command(about = "Deposit verification, withdrawal and prize payout workers", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "wallet-engine starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        chains = config.chains.len(),
        admin_enabled = config.admin.enabled,
        deposit_workers = config.queues.verify_deposit.concurrency,
        withdrawal_workers = config.queues.process_withdrawal.concurrency,
        payout_workers = config.queues.process_prize_payout.concurrency,
        "Configuration loaded"
    );

    let engine = Engine::build(config).await?;
    engine.run().await?;
    Ok(())
}
