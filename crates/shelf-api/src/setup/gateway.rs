//! Remote asset gateway setup

use anyhow::{Context, Result};
use shelf_core::Config;
use shelf_storage::{create_gateway, AssetGateway};
use std::sync::Arc;

pub async fn setup_gateway(config: &Config) -> Result<Arc<dyn AssetGateway>> {
    tracing::info!("Initializing remote asset gateway...");
    let gateway = create_gateway(config)
        .await
        .context("Failed to initialize asset gateway")?;
    tracing::info!(
        backend = %gateway.backend_type(),
        cover_namespace = %config.assets.cover_namespace,
        document_namespace = %config.assets.document_namespace,
        "Remote asset gateway initialized"
    );
    Ok(gateway)
}
