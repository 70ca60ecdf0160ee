//! StockSync server entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stocksync_infra::config;
use stocksync_server::utils::logging::init_tracing;
use stocksync_server::{router, AppContext, BackgroundJobs};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for an in-flight sync run.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the config loader reads the environment.
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("failed to load configuration")?;
    init_tracing(config.server.log_format)?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(err) => debug!(error = %err, "No .env file loaded"),
    }

    let ctx = Arc::new(AppContext::new(config).await.context("failed to initialise")?);

    let restored = ctx.orchestrator.recover_on_startup().await?;
    if restored > 0 {
        info!(restored, "Resumed sync work from previous process");
    }

    let mut jobs = BackgroundJobs::new(&ctx);
    jobs.start().await.context("failed to start schedulers")?;

    let bind_address = ctx.config.server.bind_address.clone();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %bind_address, "StockSync listening");

    let served = axum::serve(listener, router(Arc::clone(&ctx)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    jobs.stop().await;
    if !ctx.orchestrator.wait_until_idle(DRAIN_TIMEOUT).await {
        warn!("Sync work still pending at shutdown; it resumes on next start");
    }

    if let Err(err) = served {
        error!(error = %err, "Server error");
        return Err(err.into());
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
