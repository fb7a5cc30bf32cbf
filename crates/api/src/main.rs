//! Relaygate - streaming chat gateway
//!
//! Main entry point for the HTTP server.

use std::sync::Arc;

use anyhow::Context;
use relaygate_api::utils::logging::init_tracing;
use relaygate_api::{router, AppContext};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Read .env before the filter so RUST_LOG can live there
    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env file loaded"),
    }

    let config = relaygate_infra::config::load().context("failed to load configuration")?;
    let address = format!("{}:{}", config.server.host, config.server.port);

    let context = Arc::new(AppContext::new(config).context("failed to initialize gateway")?);

    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("failed to bind {address}"))?;
    info!(address = %listener.local_addr()?, "Relaygate listening");

    let draining = Arc::clone(&context);
    axum::serve(listener, router(Arc::clone(&context)))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Event streams only end on `done`, so end them before draining
            draining.begin_shutdown();
        })
        .await
        .inspect_err(|e| error!(error = %e, "Server encountered an error"))?;

    context.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal, shutting down gracefully"),
        () = terminate => info!("Received SIGTERM signal, shutting down gracefully"),
    }
}
