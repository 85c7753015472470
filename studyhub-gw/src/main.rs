//! studyhub-gw - External task orchestration gateway
//!
//! Fronts the external processing service: document upload, search,
//! plan/task generation, and the callback that delivers asynchronous results
//! to waiting sessions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use studyhub_common::config::GatewayConfig;
use studyhub_gw::sessions::spawn_sweeper;
use studyhub_gw::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};

/// Command-line arguments; flags override environment and config file
#[derive(Parser, Debug)]
#[command(name = "studyhub-gw")]
#[command(about = "External task orchestration gateway for StudyHub")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/studyhub/gateway.toml)
    #[arg(short, long, env = "STUDYHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// Base URL of the external processing service
    #[arg(long)]
    external_api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting StudyHub Gateway (studyhub-gw) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config =
        GatewayConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.external_api_url {
        config.upstream.external_api_url = Some(url);
    }
    config.log_summary();

    let state = AppState::new(&config).context("Failed to build upstream client")?;
    let sweeper = spawn_sweeper(state.sessions.clone(), config.sessions.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("studyhub-gw listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
