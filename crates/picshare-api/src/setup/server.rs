//! Server startup and graceful shutdown

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use picshare_core::Config;

use crate::constants::SHUTDOWN_DRAIN_TIMEOUT;
use crate::state::AppState;

/// Serve until a shutdown signal arrives, then drain the background task queue.
pub async fn start_server(config: &Config, app: Router, state: Arc<AppState>) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        max_file_size_mb = config.max_file_size_bytes() / 1024 / 1024,
        allowed_content_types = %config.allowed_content_types().join(","),
        palette_size = config.palette_size(),
        task_workers = config.task_queue_max_workers(),
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        pending_tasks = state.tasks.pending_count(),
        "HTTP server stopped, draining background tasks"
    );
    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, state.tasks.shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            pending_tasks = state.tasks.pending_count(),
            "Background tasks still running at shutdown deadline"
        );
    }

    state.pool.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
