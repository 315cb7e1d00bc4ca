//! Delete pipeline
//!
//! Remote teardown precedes record removal: a failed remote delete leaves the record in
//! place so the owner can retry, and a failed record delete after both remote deletes
//! leaves a ghost row that the reconciliation sweep removes.

use std::sync::Arc;

use shelf_core::{AppError, AssetCategory, IntentOperation, IntentState, RemoteAssetRef};
use shelf_db::{AssetIntentRepository, BookRepository};
use shelf_storage::AssetGateway;
use uuid::Uuid;

use super::{advance_intent, intent_open_failed, within_limit, PublishingSettings};
use crate::ownership::ensure_owner;

/// Deletion orchestrator for books and their remote assets
pub struct BookDeletionService {
    books: Arc<dyn BookRepository>,
    intents: Arc<dyn AssetIntentRepository>,
    gateway: Arc<dyn AssetGateway>,
    settings: PublishingSettings,
}

impl BookDeletionService {
    pub fn new(
        books: Arc<dyn BookRepository>,
        intents: Arc<dyn AssetIntentRepository>,
        gateway: Arc<dyn AssetGateway>,
        settings: PublishingSettings,
    ) -> Self {
        Self {
            books,
            intents,
            gateway,
            settings,
        }
    }

    /// Delete both remote assets of a book owned by `requester_id`, then its record.
    #[tracing::instrument(skip(self))]
    pub async fn delete_book(&self, requester_id: Uuid, book_id: Uuid) -> Result<(), AppError> {
        let book = self
            .books
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        ensure_owner(book.author, requester_id, "delete")?;

        let cover = RemoteAssetRef::from_url(&book.cover_image_url, AssetCategory::Image)?;
        let file = RemoteAssetRef::from_url(&book.file_url, AssetCategory::Raw)?;

        let intent = self
            .intents
            .begin(
                IntentOperation::Teardown,
                Some(book_id),
                vec![cover.clone(), file.clone()],
            )
            .await
            .map_err(intent_open_failed)?;

        for (label, asset_ref) in [("cover image", &cover), ("book file", &file)] {
            if let Err(e) = self.delete_remote(label, asset_ref).await {
                advance_intent(&self.intents, intent.id, IntentState::Abandoned, None).await;
                return Err(e);
            }
        }

        advance_intent(&self.intents, intent.id, IntentState::RemoteCommitted, None).await;

        match self.books.delete_by_id(book_id).await {
            Ok(removed) => {
                if !removed {
                    tracing::debug!(book_id = %book_id, "Book record already removed");
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    intent_id = %intent.id,
                    book_id = %book_id,
                    "Book record delete failed after remote teardown, ghost row left for reconciliation"
                );
                return Err(AppError::deletion_failure("Failed to delete book record", e));
            }
        }

        advance_intent(&self.intents, intent.id, IntentState::Done, None).await;

        tracing::info!(book_id = %book_id, "Book deleted");
        Ok(())
    }

    async fn delete_remote(&self, label: &str, asset_ref: &RemoteAssetRef) -> Result<(), AppError> {
        let operation = format!("{} delete", label);
        let start = std::time::Instant::now();

        within_limit(
            self.settings.remote_timeout,
            &operation,
            self.gateway.delete(&asset_ref.asset_id, asset_ref.category),
        )
        .await?
        .map_err(|e| {
            tracing::error!(error = %e, asset_id = %asset_ref.asset_id, "Remote asset delete failed");
            AppError::deletion_failure(format!("{} failed", operation), e)
        })?;

        tracing::debug!(
            asset_id = %asset_ref.asset_id,
            category = %asset_ref.category,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote asset deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publishing::{BookUploadService, CreateBookInput};
    use crate::test_helpers::{
        fixtures, MemoryBookRepository, MemoryIntentLog, RecordingGateway,
    };
    use shelf_core::Book;

    struct Harness {
        books: Arc<MemoryBookRepository>,
        intents: Arc<MemoryIntentLog>,
        gateway: Arc<RecordingGateway>,
        service: BookDeletionService,
    }

    fn harness() -> Harness {
        let books = Arc::new(MemoryBookRepository::new());
        let intents = Arc::new(MemoryIntentLog::new());
        let gateway = Arc::new(RecordingGateway::new());
        let service = BookDeletionService::new(
            books.clone(),
            intents.clone(),
            gateway.clone(),
            fixtures::settings(),
        );
        Harness {
            books,
            intents,
            gateway,
            service,
        }
    }

    fn seeded(h: &Harness, owner: Uuid) -> Book {
        h.books.insert(fixtures::book(owner))
    }

    #[tokio::test]
    async fn test_delete_removes_assets_then_record() {
        let h = harness();
        let owner = Uuid::new_v4();
        let book = seeded(&h, owner);

        h.service.delete_book(owner, book.id).await.unwrap();

        assert!(h.books.get(book.id).is_none());
        assert_eq!(
            h.gateway.deleted(),
            vec![
                RemoteAssetRef::new("book-covers/cover_abc123", AssetCategory::Image),
                RemoteAssetRef::new("book-pdfs/novel_xyz789.pdf", AssetCategory::Raw),
            ]
        );
        assert_eq!(h.intents.all()[0].state, IntentState::Done);
    }

    #[tokio::test]
    async fn test_delete_by_other_user_forbidden_without_gateway_calls() {
        let h = harness();
        let book = seeded(&h, Uuid::new_v4());

        let err = h.service.delete_book(Uuid::new_v4(), book.id).await.unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(h.gateway.delete_count(), 0);
        assert!(h.books.get(book.id).is_some());
        assert!(h.intents.all().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_book_not_found() {
        let h = harness();
        let err = h
            .service
            .delete_book(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(h.gateway.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_delete_failure_keeps_record() {
        let h = harness();
        let owner = Uuid::new_v4();
        let book = seeded(&h, owner);
        h.gateway.fail_deletes_for(AssetCategory::Image);

        let err = h.service.delete_book(owner, book.id).await.unwrap_err();

        assert!(matches!(err, AppError::DeletionFailure { .. }));
        assert_eq!(h.books.get(book.id), Some(book));
        assert_eq!(h.gateway.delete_attempts(AssetCategory::Raw), 0);
        assert_eq!(h.intents.all()[0].state, IntentState::Abandoned);
    }

    #[tokio::test]
    async fn test_document_delete_failure_keeps_record() {
        let h = harness();
        let owner = Uuid::new_v4();
        let book = seeded(&h, owner);
        h.gateway.fail_deletes_for(AssetCategory::Raw);

        let err = h.service.delete_book(owner, book.id).await.unwrap_err();

        assert!(matches!(err, AppError::DeletionFailure { .. }));
        assert!(h.books.get(book.id).is_some());
    }

    #[tokio::test]
    async fn test_record_delete_failure_leaves_ghost_for_sweep() {
        let h = harness();
        let owner = Uuid::new_v4();
        let book = seeded(&h, owner);
        h.books.fail_writes(true);

        let err = h.service.delete_book(owner, book.id).await.unwrap_err();

        assert!(matches!(err, AppError::DeletionFailure { .. }));
        assert_eq!(h.gateway.delete_count(), 2);
        assert!(h.books.get(book.id).is_some());
        let intent = &h.intents.all()[0];
        assert_eq!(intent.state, IntentState::RemoteCommitted);
        assert_eq!(intent.book_id, Some(book.id));
    }

    #[tokio::test]
    async fn test_retry_after_partial_teardown_converges() {
        let h = harness();
        let owner = Uuid::new_v4();
        let book = seeded(&h, owner);
        h.gateway.fail_deletes_for(AssetCategory::Raw);
        assert!(h.service.delete_book(owner, book.id).await.is_err());

        h.gateway.clear_failures();
        h.service.delete_book(owner, book.id).await.unwrap();

        assert!(h.books.get(book.id).is_none());
    }

    #[tokio::test]
    async fn test_local_path_in_record_is_server_error() {
        let h = harness();
        let owner = Uuid::new_v4();
        let mut book = fixtures::book(owner);
        book.cover_image_url = "public/data/uploads/cover.jpg".to_string();
        let book = h.books.insert(book);

        let err = h.service.delete_book(owner, book.id).await.unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(h.gateway.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_targets_decoded_asset_ids() {
        let h = harness();
        let owner = Uuid::new_v4();
        let mut book = fixtures::book(owner);
        book.cover_image_url =
            "https://res.cloudinary.com/demo/image/upload/v1/book-covers/caf%C3%A9_abc123.jpg"
                .to_string();
        let book = h.books.insert(book);
        let cover = RemoteAssetRef::new("book-covers/café_abc123", AssetCategory::Image);
        h.gateway.store(cover.clone());

        h.service.delete_book(owner, book.id).await.unwrap();

        assert!(!h.gateway.is_stored(&cover));
        assert_eq!(h.gateway.deleted()[0], cover);
        assert!(h.books.get(book.id).is_none());
    }

    #[tokio::test]
    async fn test_create_then_delete_end_to_end() {
        let books = Arc::new(MemoryBookRepository::new());
        let intents = Arc::new(MemoryIntentLog::new());
        let gateway = Arc::new(RecordingGateway::new());
        let staging = tempfile::tempdir().unwrap();
        let uploader = BookUploadService::new(
            books.clone(),
            intents.clone(),
            gateway.clone(),
            fixtures::settings(),
        );
        let deleter = BookDeletionService::new(
            books.clone(),
            intents.clone(),
            gateway.clone(),
            fixtures::settings(),
        );
        let owner = Uuid::new_v4();

        let book = uploader
            .create_book(
                owner,
                CreateBookInput {
                    title: "Dune".to_string(),
                    genre: "Science fiction".to_string(),
                    cover_image: Some(fixtures::staged_cover(staging.path())),
                    file: Some(fixtures::staged_document(staging.path())),
                },
            )
            .await
            .unwrap();
        assert!(gateway.is_stored(&RemoteAssetRef::from_url(&book.cover_image_url, AssetCategory::Image).unwrap()));

        deleter.delete_book(owner, book.id).await.unwrap();

        assert_eq!(gateway.delete_attempts(AssetCategory::Image), 1);
        assert_eq!(gateway.delete_attempts(AssetCategory::Raw), 1);
        assert_eq!(gateway.stored_count(), 0);
        assert!(books.get(book.id).is_none());
        assert!(intents.all().iter().all(|i| i.state == IntentState::Done));
    }
}
