//! flagdesk-svc - Manifest reconciliation and order lookup service
//!
//! Serves digit-fragment order lookups for warehouse staff and the admin
//! ingestion surface (manifest photos, PDFs and spreadsheets) over HTTP.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flagdesk_common::config::TomlConfig;
use flagdesk_svc::config::ServiceConfig;
use flagdesk_svc::store::{open_table, StoreAdapter};
use flagdesk_svc::AppState;

/// Command-line arguments for flagdesk-svc
#[derive(Parser, Debug)]
#[command(name = "flagdesk-svc")]
#[command(about = "Manifest reconciliation and order lookup service")]
#[command(version)]
struct Args {
    /// Configuration file (overrides FLAGDESK_CONFIG and default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides bind_addr from the config file)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{},tower_http=info", toml.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting flagdesk-svc v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ServiceConfig::resolve(&toml).context("Invalid configuration")?;
    let bind_addr = args.bind.unwrap_or_else(|| config.bind_addr.clone());

    let table = open_table(&config.store.target)
        .await
        .context("Failed to open record table")?;
    let store = StoreAdapter::new(table, config.store.options).context("Invalid store options")?;
    info!(
        backend = store.backend_name(),
        persist_order_number = config.store.options.persist_order_number,
        optimistic_concurrency = config.store.options.optimistic_concurrency,
        "Record store ready"
    );

    let extractor = flagdesk_svc::build_extractor(&config).context("Failed to set up extractor")?;
    info!(
        extractor = extractor.name(),
        pacing_ms = config.ingest.pacing.as_millis() as u64,
        max_image_dim = config.ingest.max_image_dim,
        on_extraction_failure = ?config.ingest.on_extraction_failure,
        "Ingestion configured"
    );

    let state = AppState::new(store, extractor, &config);
    let app = flagdesk_svc::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
