//! # Stockline API server
//!
//! Loads configuration, opens the database (running migrations) and serves
//! the REST API until Ctrl+C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stockline_api::{build_router, ApiConfig, AppState};
use stockline_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stockline_api=info,stockline_db=info,tower_http=info")),
        )
        .with_target(true)
        .init();

    info!("Starting Stockline API server...");

    let config = ApiConfig::load().context("failed to load configuration")?;
    let addr = config.bind_addr()?;
    info!(
        env = %config.app_env,
        %addr,
        database = %config.database_url,
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(&config.database_url).max_connections(config.db_max_connections),
    )
    .await
    .context("failed to open database")?;

    let state = Arc::new(AppState::new(db.clone(), config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
