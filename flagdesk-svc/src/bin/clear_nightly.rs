//! clear-nightly - empty the record table once and exit
//!
//! Meant to be run by an external scheduler (cron, Task Scheduler, CI):
//!
//! ```text
//! 0 0 * * * /usr/local/bin/clear-nightly --config /etc/flagdesk/flagdesk.toml
//! ```
//!
//! Uses the same configuration as the service. The table is left with the
//! canonical headers and no rows. Exits non-zero if the store write fails.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flagdesk_common::config::TomlConfig;
use flagdesk_svc::config::ServiceConfig;
use flagdesk_svc::store::{open_table, StoreAdapter};

#[derive(Parser, Debug)]
#[command(name = "clear-nightly")]
#[command(about = "Clear the flagdesk record table (headers are kept)")]
#[command(version)]
struct Args {
    /// Configuration file (overrides FLAGDESK_CONFIG and default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "clear-nightly v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let config = ServiceConfig::resolve(&toml).context("Invalid configuration")?;
    let table = open_table(&config.store.target)
        .await
        .context("Failed to open record table")?;

    // Clearing never carries a version, so versioning is irrelevant here
    let options = flagdesk_svc::config::StoreOptions {
        optimistic_concurrency: false,
        ..config.store.options
    };
    let store = StoreAdapter::new(table, options)?;

    store.clear().await.context("Failed to clear record table")?;
    info!(backend = store.backend_name(), "Record table cleared");

    Ok(())
}
