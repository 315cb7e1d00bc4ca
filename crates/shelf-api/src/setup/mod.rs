//! Application setup and initialization

pub mod database;
pub mod gateway;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use shelf_core::Config;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Initialize the entire application. Also returns the reconciliation sweep handle, if running.
pub async fn initialize_app(
    config: Config,
) -> Result<(Arc<AppState>, axum::Router, Option<JoinHandle<()>>)> {
    // Fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(&config.base.environment)?;
    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;
    let gateway = gateway::setup_gateway(&config).await?;

    let config = Arc::new(config);
    let (state, reconciler) =
        services::initialize_services(config.clone(), pool, gateway).await?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router, reconciler))
}
