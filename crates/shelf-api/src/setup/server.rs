//! Server startup and graceful shutdown

use anyhow::Result;
use axum::Router;
use shelf_core::Config;
use tokio::task::JoinHandle;

/// Start the server with graceful shutdown. The background sweep is stopped once the server
/// has drained.
pub async fn start_server(
    config: &Config,
    app: Router,
    reconciler: Option<JoinHandle<()>>,
) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.base.server_port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        max_upload_mb = config.assets.max_upload_bytes / 1024 / 1024,
        staging_dir = %config.assets.staging_dir.display(),
        backend = %config.assets.backend,
        remote_call_timeout_secs = config.assets.remote_call_timeout_secs,
        "Server ready and accepting connections"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(handle) = reconciler {
        handle.abort();
        tracing::info!("Asset intent reconciliation stopped");
    }

    served?;
    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM. A handler that cannot be installed is logged and
/// never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
