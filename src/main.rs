//! pet-adoption - adoption lifecycle service.
//!
//! Loads configuration, opens the store and serves the HTTP API until
//! SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use pet_adoption::config::{self, AppConfig};
use pet_adoption::{LifecycleCoordinator, Store, api};

#[derive(Parser, Debug)]
#[command(name = "pet-adoption", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./pet-adoption.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the listening port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config: AppConfig = match &cli.config {
        Some(path) => config::load_config_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => config::load_config().context("failed to load config")?,
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_tracing(&config.log_level);

    let store = Store::open_with(&config.storage)
        .with_context(|| format!("failed to open store at {}", config.storage.path.display()))?;
    let coordinator = Arc::new(LifecycleCoordinator::new(store.clone(), config.lifecycle));
    let app = api::router(coordinator);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("pet-adoption listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.flush().context("failed to flush store")?;
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pet_adoption={log_level},tower_http={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "no SIGTERM handler, waiting for Ctrl+C");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received Ctrl+C, shutting down");
    }
}
