//! Background reconciliation of the asset intent log
//!
//! | operation | state | age | action |
//! |---|---|---|---|
//! | any | `rolling_back` | any | delete recorded assets, `done` |
//! | publish, retire | `pending` / `remote_committed` | past grace | delete recorded assets, `done` |
//! | publish | `record_committed` | past grace | `done` |
//! | teardown | `remote_committed` | any | delete the ghost record, `done` |
//! | teardown | `pending` | past grace | `abandoned` (record still intact) |
//!
//! Assets still referenced by the intent's book record are never deleted, whatever the state.
//! Intents that keep failing are abandoned once they reach the attempt limit.

use chrono::Utc;
use shelf_core::{
    AppError, AssetCategory, AssetIntent, IntentOperation, IntentState, ReconcileConfig,
    RemoteAssetRef,
};
use shelf_db::{AssetIntentRepository, BookRepository};
use shelf_storage::AssetGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::publishing::within_limit;

/// Counters of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub completed: usize,
    pub abandoned: usize,
    pub failed: usize,
    /// Still inside the grace period
    pub deferred: usize,
}

enum Resolution {
    Done,
    Abandoned,
    Deferred,
}

#[derive(Clone)]
pub struct ReconciliationService {
    intents: Arc<dyn AssetIntentRepository>,
    books: Arc<dyn BookRepository>,
    gateway: Arc<dyn AssetGateway>,
    config: ReconcileConfig,
    remote_timeout: Duration,
}

impl ReconciliationService {
    pub fn new(
        intents: Arc<dyn AssetIntentRepository>,
        books: Arc<dyn BookRepository>,
        gateway: Arc<dyn AssetGateway>,
        config: ReconcileConfig,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            intents,
            books,
            gateway,
            config,
            remote_timeout,
        }
    }

    /// Start the background sweep. Returns `None` when the interval is 0 (disabled).
    /// The caller owns the handle and aborts it on shutdown.
    pub fn start(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self.config.interval_secs == 0 {
            tracing::info!("Asset intent reconciliation disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut sweep_interval = interval(Duration::from_secs(self.config.interval_secs));

            loop {
                sweep_interval.tick().await;

                match self.sweep().await {
                    Ok(report) if report.examined > 0 => {
                        tracing::info!(
                            examined = report.examined,
                            completed = report.completed,
                            abandoned = report.abandoned,
                            failed = report.failed,
                            deferred = report.deferred,
                            "Reconciliation sweep completed"
                        );
                    }
                    Ok(_) => {
                        tracing::debug!("Reconciliation sweep found nothing to do");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Reconciliation sweep failed");
                    }
                }
            }
        }))
    }

    /// Resolve one batch of unfinished intents.
    #[tracing::instrument(skip(self), fields(reconcile.operation = "sweep"))]
    pub async fn sweep(&self) -> Result<SweepReport, AppError> {
        let pending = self.intents.list_unresolved(self.config.batch_size).await?;
        let mut report = SweepReport {
            examined: pending.len(),
            ..Default::default()
        };

        for intent in pending {
            if intent.attempts >= self.config.max_attempts {
                tracing::error!(
                    intent_id = %intent.id,
                    operation = %intent.operation,
                    state = %intent.state,
                    attempts = intent.attempts,
                    last_error = ?intent.last_error,
                    "Giving up on asset intent, manual cleanup required"
                );
                if self.settle(&intent, IntentState::Abandoned).await {
                    report.abandoned += 1;
                } else {
                    report.failed += 1;
                }
                continue;
            }

            match self.resolve(&intent).await {
                Ok(Resolution::Done) => {
                    if self.settle(&intent, IntentState::Done).await {
                        report.completed += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Ok(Resolution::Abandoned) => {
                    if self.settle(&intent, IntentState::Abandoned).await {
                        report.abandoned += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Ok(Resolution::Deferred) => {
                    report.deferred += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        intent_id = %intent.id,
                        operation = %intent.operation,
                        "Failed to resolve asset intent"
                    );
                    if let Err(write_err) = self
                        .intents
                        .record_failure(intent.id, &e.detailed_message())
                        .await
                    {
                        tracing::warn!(
                            error = %write_err,
                            intent_id = %intent.id,
                            "Failed to record asset intent failure"
                        );
                    }
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Persist the outcome of one intent. A failed write leaves it for the next sweep.
    async fn settle(&self, intent: &AssetIntent, state: IntentState) -> bool {
        match self.intents.transition(intent.id, state, None).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    intent_id = %intent.id,
                    state = %state,
                    "Failed to persist asset intent outcome"
                );
                false
            }
        }
    }

    async fn resolve(&self, intent: &AssetIntent) -> Result<Resolution, AppError> {
        let stale = intent.is_stale(Utc::now(), self.config.grace_period_secs);

        match (intent.operation, intent.state) {
            (_, IntentState::RollingBack) => {
                self.delete_assets(intent).await?;
                Ok(Resolution::Done)
            }
            (
                IntentOperation::Publish | IntentOperation::Retire,
                IntentState::Pending | IntentState::RemoteCommitted,
            ) if stale => {
                self.delete_assets(intent).await?;
                Ok(Resolution::Done)
            }
            (IntentOperation::Publish | IntentOperation::Retire, IntentState::RecordCommitted)
                if stale =>
            {
                Ok(Resolution::Done)
            }
            (IntentOperation::Teardown, IntentState::RemoteCommitted) => {
                if let Some(book_id) = intent.book_id {
                    let removed = self.books.delete_by_id(book_id).await?;
                    tracing::info!(
                        intent_id = %intent.id,
                        book_id = %book_id,
                        removed,
                        "Removed ghost book record"
                    );
                }
                Ok(Resolution::Done)
            }
            (IntentOperation::Teardown, IntentState::Pending) if stale => {
                Ok(Resolution::Abandoned)
            }
            // A teardown never reaches record_committed; treat it as finished.
            (IntentOperation::Teardown, IntentState::RecordCommitted) => Ok(Resolution::Done),
            (_, IntentState::Done | IntentState::Abandoned) => Ok(Resolution::Done),
            _ => Ok(Resolution::Deferred),
        }
    }

    /// Delete every recorded asset the book record does not point at. "Already gone" counts
    /// as success.
    async fn delete_assets(&self, intent: &AssetIntent) -> Result<(), AppError> {
        let referenced = self.referenced_assets(intent).await?;

        for asset in &intent.assets {
            if referenced.contains(asset) {
                tracing::info!(
                    intent_id = %intent.id,
                    asset_id = %asset.asset_id,
                    "Asset still referenced by its book, kept"
                );
                continue;
            }

            within_limit(
                self.remote_timeout,
                "reconciliation delete",
                self.gateway.delete(&asset.asset_id, asset.category),
            )
            .await?
            .map_err(|e| {
                AppError::deletion_failure(format!("Failed to delete {}", asset.asset_id), e)
            })?;

            tracing::info!(
                intent_id = %intent.id,
                asset_id = %asset.asset_id,
                category = %asset.category,
                "Deleted orphaned asset"
            );
        }
        Ok(())
    }

    /// Assets the intent's book currently points at, empty if there is no such record.
    async fn referenced_assets(
        &self,
        intent: &AssetIntent,
    ) -> Result<Vec<RemoteAssetRef>, AppError> {
        let Some(book_id) = intent.book_id else {
            return Ok(Vec::new());
        };
        let Some(book) = self.books.find_by_id(book_id).await? else {
            return Ok(Vec::new());
        };

        Ok(vec![
            RemoteAssetRef::from_url(&book.cover_image_url, AssetCategory::Image)?,
            RemoteAssetRef::from_url(&book.file_url, AssetCategory::Raw)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publishing::{BookUploadService, CreateBookInput};
    use crate::test_helpers::{fixtures, MemoryBookRepository, MemoryIntentLog, RecordingGateway};
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    struct Harness {
        books: Arc<MemoryBookRepository>,
        intents: Arc<MemoryIntentLog>,
        gateway: Arc<RecordingGateway>,
        service: ReconciliationService,
    }

    fn harness() -> Harness {
        let books = Arc::new(MemoryBookRepository::new());
        let intents = Arc::new(MemoryIntentLog::new());
        let gateway = Arc::new(RecordingGateway::new());
        let service = ReconciliationService::new(
            intents.clone(),
            books.clone(),
            gateway.clone(),
            ReconcileConfig {
                interval_secs: 60,
                grace_period_secs: 300,
                max_attempts: 3,
                batch_size: 50,
            },
            Duration::from_secs(5),
        );
        Harness {
            books,
            intents,
            gateway,
            service,
        }
    }

    fn cover_ref() -> RemoteAssetRef {
        RemoteAssetRef::new("book-covers/cover_abc123", AssetCategory::Image)
    }

    fn file_ref() -> RemoteAssetRef {
        RemoteAssetRef::new("book-pdfs/novel_xyz789.pdf", AssetCategory::Raw)
    }

    fn intent(
        operation: IntentOperation,
        state: IntentState,
        age_secs: i64,
        assets: Vec<RemoteAssetRef>,
    ) -> AssetIntent {
        let at = Utc::now() - ChronoDuration::seconds(age_secs);
        AssetIntent {
            id: Uuid::new_v4(),
            operation,
            state,
            book_id: None,
            assets,
            attempts: 0,
            last_error: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_rolling_back_deletes_assets_immediately() {
        let h = harness();
        h.gateway.store(cover_ref());
        h.gateway.store(file_ref());
        let seeded = h.intents.insert(intent(
            IntentOperation::Publish,
            IntentState::RollingBack,
            0,
            vec![cover_ref(), file_ref()],
        ));

        let report = h.service.sweep().await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(h.gateway.stored_count(), 0);
        assert_eq!(h.intents.get(seeded.id).unwrap().state, IntentState::Done);
    }

    #[tokio::test]
    async fn test_fresh_publish_is_deferred() {
        let h = harness();
        let seeded = h.intents.insert(intent(
            IntentOperation::Publish,
            IntentState::RemoteCommitted,
            10,
            vec![cover_ref()],
        ));

        let report = h.service.sweep().await.unwrap();

        assert_eq!(report.deferred, 1);
        assert_eq!(h.gateway.delete_count(), 0);
        assert_eq!(
            h.intents.get(seeded.id).unwrap().state,
            IntentState::RemoteCommitted
        );
    }

    #[tokio::test]
    async fn test_stale_publish_orphans_are_deleted() {
        let h = harness();
        let seeded = h.intents.insert(intent(
            IntentOperation::Publish,
            IntentState::Pending,
            600,
            vec![cover_ref()],
        ));

        h.service.sweep().await.unwrap();

        assert_eq!(h.gateway.deleted(), vec![cover_ref()]);
        assert_eq!(h.intents.get(seeded.id).unwrap().state, IntentState::Done);
    }

    #[tokio::test]
    async fn test_stale_record_committed_is_closed_without_deletes() {
        let h = harness();
        let seeded = h.intents.insert(intent(
            IntentOperation::Publish,
            IntentState::RecordCommitted,
            600,
            vec![cover_ref(), file_ref()],
        ));

        h.service.sweep().await.unwrap();

        assert_eq!(h.gateway.delete_count(), 0);
        assert_eq!(h.intents.get(seeded.id).unwrap().state, IntentState::Done);
    }

    #[tokio::test]
    async fn test_teardown_ghost_row_removed() {
        let h = harness();
        let book = h.books.insert(fixtures::book(Uuid::new_v4()));
        let mut ghost = intent(
            IntentOperation::Teardown,
            IntentState::RemoteCommitted,
            0,
            vec![cover_ref(), file_ref()],
        );
        ghost.book_id = Some(book.id);
        let seeded = h.intents.insert(ghost);

        h.service.sweep().await.unwrap();

        assert!(h.books.get(book.id).is_none());
        assert_eq!(h.gateway.delete_count(), 0);
        assert_eq!(h.intents.get(seeded.id).unwrap().state, IntentState::Done);
    }

    #[tokio::test]
    async fn test_stale_pending_teardown_abandoned() {
        let h = harness();
        let book = h.books.insert(fixtures::book(Uuid::new_v4()));
        let mut pending = intent(
            IntentOperation::Teardown,
            IntentState::Pending,
            600,
            vec![cover_ref(), file_ref()],
        );
        pending.book_id = Some(book.id);
        let seeded = h.intents.insert(pending);

        let report = h.service.sweep().await.unwrap();

        assert_eq!(report.abandoned, 1);
        assert!(h.books.get(book.id).is_some());
        assert_eq!(
            h.intents.get(seeded.id).unwrap().state,
            IntentState::Abandoned
        );
    }

    #[tokio::test]
    async fn test_failed_delete_counts_attempt_then_gives_up() {
        let h = harness();
        h.gateway.fail_deletes_for(AssetCategory::Raw);
        let seeded = h.intents.insert(intent(
            IntentOperation::Retire,
            IntentState::RollingBack,
            0,
            vec![file_ref()],
        ));

        for _ in 0..3 {
            let report = h.service.sweep().await.unwrap();
            assert_eq!(report.failed, 1);
        }
        let stored = h.intents.get(seeded.id).unwrap();
        assert_eq!(stored.attempts, 3);
        assert!(stored.last_error.is_some());

        let report = h.service.sweep().await.unwrap();
        assert_eq!(report.abandoned, 1);
        assert_eq!(
            h.intents.get(seeded.id).unwrap().state,
            IntentState::Abandoned
        );
    }

    #[tokio::test]
    async fn test_stale_publish_keeps_assets_the_book_references() {
        let h = harness();
        let book = h.books.insert(fixtures::book(Uuid::new_v4()));
        let replaced = RemoteAssetRef::new("book-covers/cover_next1", AssetCategory::Image);
        let mut stale = intent(
            IntentOperation::Publish,
            IntentState::RemoteCommitted,
            600,
            vec![replaced.clone(), file_ref()],
        );
        stale.book_id = Some(book.id);
        let seeded = h.intents.insert(stale);

        let report = h.service.sweep().await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(h.gateway.deleted(), vec![replaced]);
        assert_eq!(h.intents.get(seeded.id).unwrap().state, IntentState::Done);
    }

    #[tokio::test]
    async fn test_lost_intent_writes_after_create_keep_live_assets() {
        let h = harness();
        let staging = tempfile::tempdir().unwrap();
        let uploader = BookUploadService::new(
            h.books.clone(),
            h.intents.clone(),
            h.gateway.clone(),
            fixtures::settings(),
        );
        h.intents
            .fail_transitions_to(&[IntentState::RecordCommitted, IntentState::Done]);

        let book = uploader
            .create_book(
                Uuid::new_v4(),
                CreateBookInput {
                    title: "Dune".to_string(),
                    genre: "Science fiction".to_string(),
                    cover_image: Some(fixtures::staged_cover(staging.path())),
                    file: Some(fixtures::staged_document(staging.path())),
                },
            )
            .await
            .unwrap();

        let stuck = h.intents.all().remove(0);
        assert_eq!(stuck.state, IntentState::RemoteCommitted);
        assert_eq!(stuck.book_id, Some(book.id));

        h.intents.fail_transitions_to(&[]);
        h.intents.backdate(stuck.id, ChronoDuration::seconds(600));
        h.service.sweep().await.unwrap();

        assert_eq!(h.gateway.delete_count(), 0);
        assert_eq!(h.gateway.stored_count(), 2);
        assert!(h.books.get(book.id).is_some());
        assert_eq!(h.intents.get(stuck.id).unwrap().state, IntentState::Done);
    }

    #[tokio::test]
    async fn test_failed_outcome_write_does_not_stop_the_batch() {
        let h = harness();
        let first = h.intents.insert(intent(
            IntentOperation::Publish,
            IntentState::RollingBack,
            20,
            vec![cover_ref()],
        ));
        let second = h.intents.insert(intent(
            IntentOperation::Retire,
            IntentState::RollingBack,
            10,
            vec![file_ref()],
        ));
        h.intents.fail_transitions_to(&[IntentState::Done]);

        let report = h.service.sweep().await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(h.gateway.deleted(), vec![cover_ref(), file_ref()]);

        h.intents.fail_transitions_to(&[]);
        let report = h.service.sweep().await.unwrap();

        assert_eq!(report.completed, 2);
        assert_eq!(h.intents.get(first.id).unwrap().state, IntentState::Done);
        assert_eq!(h.intents.get(second.id).unwrap().state, IntentState::Done);
    }

    #[tokio::test]
    async fn test_disabled_interval_does_not_spawn() {
        let mut h = harness();
        h.service.config.interval_secs = 0;
        assert!(Arc::new(h.service).start().is_none());
    }

    #[tokio::test]
    async fn test_started_sweep_stops_when_aborted() {
        let h = harness();
        let handle = Arc::new(h.service).start().expect("sweep spawned");

        handle.abort();

        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
