//! Service wiring: repositories, orchestrators and the reconciliation sweep

use crate::state::{AppState, StagingConfig};
use anyhow::{Context, Result};
use shelf_core::Config;
use shelf_db::{AssetIntentRepository, BookRepository, PgAssetIntentRepository, PgBookRepository};
use shelf_services::{
    BookDeletionService, BookUploadService, PublishingSettings, ReconciliationService,
};
use shelf_storage::AssetGateway;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Build the shared state and start the sweep. The sweep handle is `None` when disabled.
pub async fn initialize_services(
    config: Arc<Config>,
    pool: PgPool,
    gateway: Arc<dyn AssetGateway>,
) -> Result<(Arc<AppState>, Option<JoinHandle<()>>)> {
    let staging = StagingConfig::from_config(&config);
    tokio::fs::create_dir_all(&staging.dir)
        .await
        .with_context(|| format!("Failed to create staging dir {}", staging.dir.display()))?;

    let books: Arc<dyn BookRepository> = Arc::new(PgBookRepository::new(pool.clone()));
    let intents: Arc<dyn AssetIntentRepository> = Arc::new(PgAssetIntentRepository::new(pool));
    let settings = PublishingSettings::from_config(&config);

    let upload_service = Arc::new(BookUploadService::new(
        books.clone(),
        intents.clone(),
        gateway.clone(),
        settings.clone(),
    ));
    let deletion_service = Arc::new(BookDeletionService::new(
        books.clone(),
        intents.clone(),
        gateway.clone(),
        settings,
    ));

    let reconciler = Arc::new(ReconciliationService::new(
        intents,
        books,
        gateway,
        config.reconcile.clone(),
        config.remote_call_timeout(),
    ));
    let reconciler_handle = reconciler.start();
    if reconciler_handle.is_some() {
        tracing::info!(
            interval_secs = config.reconcile.interval_secs,
            grace_period_secs = config.reconcile.grace_period_secs,
            "Asset intent reconciliation started"
        );
    }

    let state = Arc::new(AppState {
        upload_service,
        deletion_service,
        staging,
    });

    Ok((state, reconciler_handle))
}
