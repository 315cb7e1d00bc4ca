//! Create and update pipelines
//!
//! Steps are strictly ordered: cover image upload, document upload, record write. A failed
//! upload aborts before the record store is touched. A failed record write leaves the
//! uploaded assets to the reconciliation sweep through a `rolling_back` intent. Staged files
//! are released on every exit path.
//!
//! Publish intents always carry the book id, a fresh one for creates, so the sweep can tell
//! assets the record already references from true orphans.

use std::sync::Arc;

use shelf_core::{
    AppError, AssetSlot, Book, BookChanges, IntentOperation, IntentState, NewBook,
    RemoteAssetRef, StagedAsset,
};
use shelf_db::{AssetIntentRepository, BookRepository};
use shelf_storage::{AssetGateway, UploadOptions, UploadedAsset};
use uuid::Uuid;

use super::{advance_intent, intent_open_failed, within_limit, PublishingSettings};
use crate::ownership::ensure_owner;
use crate::staging::release_staged;

/// Fields and staged files of a create request
#[derive(Debug, Clone)]
pub struct CreateBookInput {
    pub title: String,
    pub genre: String,
    pub cover_image: Option<StagedAsset>,
    pub file: Option<StagedAsset>,
}

impl CreateBookInput {
    fn staged(&self) -> Vec<StagedAsset> {
        self.cover_image.iter().chain(self.file.iter()).cloned().collect()
    }
}

/// Fields and staged files of an update request. `None` leaves the stored value as is.
#[derive(Debug, Clone, Default)]
pub struct UpdateBookInput {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub cover_image: Option<StagedAsset>,
    pub file: Option<StagedAsset>,
}

impl UpdateBookInput {
    fn staged(&self) -> Vec<StagedAsset> {
        self.cover_image.iter().chain(self.file.iter()).cloned().collect()
    }
}

/// Upload orchestrator for book assets
pub struct BookUploadService {
    books: Arc<dyn BookRepository>,
    intents: Arc<dyn AssetIntentRepository>,
    gateway: Arc<dyn AssetGateway>,
    settings: PublishingSettings,
}

impl BookUploadService {
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

    /// Upload both assets and create the book record owned by `requester_id`.
    #[tracing::instrument(skip(self, input))]
    pub async fn create_book(
        &self,
        requester_id: Uuid,
        input: CreateBookInput,
    ) -> Result<Book, AppError> {
        let staged = input.staged();
        let result = self.publish_new(requester_id, input).await;
        release_staged(&staged).await;
        result
    }

    /// Replace the supplied fields and assets of a book owned by `requester_id`.
    #[tracing::instrument(skip(self, input))]
    pub async fn update_book(
        &self,
        requester_id: Uuid,
        book_id: Uuid,
        input: UpdateBookInput,
    ) -> Result<Book, AppError> {
        let staged = input.staged();
        let result = self.apply_update(requester_id, book_id, input).await;
        release_staged(&staged).await;
        result
    }

    async fn publish_new(
        &self,
        requester_id: Uuid,
        input: CreateBookInput,
    ) -> Result<Book, AppError> {
        let title = required_text("title", &input.title)?;
        let genre = required_text("genre", &input.genre)?;
        let cover = required_asset(AssetSlot::CoverImage, input.cover_image.as_ref())?;
        let file = required_asset(AssetSlot::File, input.file.as_ref())?;

        let book_id = Uuid::new_v4();
        let intent = self
            .intents
            .begin(IntentOperation::Publish, Some(book_id), Vec::new())
            .await
            .map_err(intent_open_failed)?;

        let uploads = self
            .upload_slots(intent.id, &[(AssetSlot::CoverImage, cover), (AssetSlot::File, file)])
            .await?;
        let (cover_upload, file_upload) = match uploads.as_slice() {
            [cover, file] => (cover.1.clone(), file.1.clone()),
            _ => {
                return Err(AppError::Internal(
                    "Expected exactly two uploaded assets".to_string(),
                ))
            }
        };

        advance_intent(&self.intents, intent.id, IntentState::RemoteCommitted, None).await;

        let new_book = NewBook {
            id: book_id,
            title,
            genre,
            author: requester_id,
            cover_image_url: cover_upload.secure_url,
            file_url: file_upload.secure_url,
        };

        let book = match self.books.create(new_book).await {
            Ok(book) => book,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    intent_id = %intent.id,
                    "Book record creation failed after upload, assets left for reconciliation"
                );
                advance_intent(&self.intents, intent.id, IntentState::RollingBack, None).await;
                return Err(AppError::persistence_failure(
                    "Failed to create book record",
                    e,
                ));
            }
        };

        advance_intent(&self.intents, intent.id, IntentState::RecordCommitted, None).await;
        advance_intent(&self.intents, intent.id, IntentState::Done, None).await;

        tracing::info!(book_id = %book.id, "Book published");
        Ok(book)
    }

    async fn apply_update(
        &self,
        requester_id: Uuid,
        book_id: Uuid,
        input: UpdateBookInput,
    ) -> Result<Book, AppError> {
        let existing = self
            .books
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        ensure_owner(existing.author, requester_id, "update")?;

        let mut changes = BookChanges::default();
        if let Some(ref title) = input.title {
            let title = required_text("title", title)?;
            if title != existing.title {
                changes.title = Some(title);
            }
        }
        if let Some(ref genre) = input.genre {
            let genre = required_text("genre", genre)?;
            if genre != existing.genre {
                changes.genre = Some(genre);
            }
        }

        let mut slots: Vec<(AssetSlot, &StagedAsset)> = Vec::new();
        if let Some(ref cover) = input.cover_image {
            slots.push((
                AssetSlot::CoverImage,
                required_asset(AssetSlot::CoverImage, Some(cover))?,
            ));
        }
        if let Some(ref file) = input.file {
            slots.push((AssetSlot::File, required_asset(AssetSlot::File, Some(file))?));
        }

        if slots.is_empty() {
            return self.update_fields_only(existing, changes).await;
        }

        let intent = self
            .intents
            .begin(IntentOperation::Publish, Some(book_id), Vec::new())
            .await
            .map_err(intent_open_failed)?;

        let uploads = self.upload_slots(intent.id, &slots).await?;

        let mut superseded = Vec::new();
        for (slot, uploaded) in &uploads {
            match slot {
                AssetSlot::CoverImage => {
                    changes.cover_image_url = Some(uploaded.secure_url.clone());
                    superseded.push((*slot, existing.cover_image_url.clone()));
                }
                AssetSlot::File => {
                    changes.file_url = Some(uploaded.secure_url.clone());
                    superseded.push((*slot, existing.file_url.clone()));
                }
            }
        }

        advance_intent(&self.intents, intent.id, IntentState::RemoteCommitted, None).await;

        let updated = match self.books.update_by_id(book_id, changes).await {
            Ok(Some(book)) => book,
            Ok(None) => {
                advance_intent(&self.intents, intent.id, IntentState::RollingBack, None).await;
                return Err(AppError::NotFound("Book not found".to_string()));
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    intent_id = %intent.id,
                    book_id = %book_id,
                    "Book record update failed after upload, assets left for reconciliation"
                );
                advance_intent(&self.intents, intent.id, IntentState::RollingBack, None).await;
                return Err(AppError::persistence_failure(
                    "Failed to update book record",
                    e,
                ));
            }
        };

        advance_intent(&self.intents, intent.id, IntentState::RecordCommitted, None).await;
        self.retire_superseded(book_id, &superseded).await;
        advance_intent(&self.intents, intent.id, IntentState::Done, None).await;

        tracing::info!(book_id = %book_id, replaced = uploads.len(), "Book updated");
        Ok(updated)
    }

    async fn update_fields_only(
        &self,
        existing: Book,
        changes: BookChanges,
    ) -> Result<Book, AppError> {
        if changes.is_empty() {
            tracing::debug!(book_id = %existing.id, "Update carries no changes");
            return Ok(existing);
        }

        match self.books.update_by_id(existing.id, changes).await {
            Ok(Some(book)) => Ok(book),
            Ok(None) => Err(AppError::NotFound("Book not found".to_string())),
            Err(e) => Err(AppError::persistence_failure(
                "Failed to update book record",
                e,
            )),
        }
    }

    /// Upload `slots` in order, stopping at the first failure.
    ///
    /// Each successful upload is appended to the intent. On failure the intent moves to
    /// `rolling_back` if anything was uploaded, otherwise to `abandoned`.
    async fn upload_slots(
        &self,
        intent_id: Uuid,
        slots: &[(AssetSlot, &StagedAsset)],
    ) -> Result<Vec<(AssetSlot, UploadedAsset)>, AppError> {
        let mut uploaded = Vec::with_capacity(slots.len());

        for (slot, asset) in slots {
            match self.upload_one(*slot, asset).await {
                Ok(result) => {
                    let asset_ref = RemoteAssetRef::new(&result.asset_id, slot.category());
                    if let Err(e) = self.intents.record_asset(intent_id, asset_ref).await {
                        tracing::warn!(
                            error = %e,
                            intent_id = %intent_id,
                            asset_id = %result.asset_id,
                            "Failed to record uploaded asset on intent"
                        );
                    }
                    uploaded.push((*slot, result));
                }
                Err(e) => {
                    let next = if uploaded.is_empty() {
                        IntentState::Abandoned
                    } else {
                        IntentState::RollingBack
                    };
                    advance_intent(&self.intents, intent_id, next, None).await;
                    return Err(e);
                }
            }
        }

        Ok(uploaded)
    }

    async fn upload_one(
        &self,
        slot: AssetSlot,
        asset: &StagedAsset,
    ) -> Result<UploadedAsset, AppError> {
        let options = UploadOptions {
            target_filename: asset.original_filename.clone(),
            namespace: self.settings.namespace_for(slot).to_string(),
            format: asset.format().map(String::from),
            category: slot.category(),
        };
        let operation = format!("{} upload", slot.label());
        let start = std::time::Instant::now();

        let uploaded = within_limit(
            self.settings.remote_timeout,
            &operation,
            self.gateway.upload(&asset.path, &options),
        )
        .await?
        .map_err(|e| {
            tracing::error!(error = %e, slot = slot.field_name(), "Asset upload failed");
            AppError::upload_failure(format!("{} failed", operation), e)
        })?;

        tracing::info!(
            slot = slot.field_name(),
            asset_id = %uploaded.asset_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Asset uploaded"
        );
        Ok(uploaded)
    }

    /// Delete remote assets replaced by an update. Failures are handed to the sweep as a
    /// `retire` intent and never fail the request.
    async fn retire_superseded(&self, book_id: Uuid, superseded: &[(AssetSlot, String)]) {
        let mut leftovers = Vec::new();

        for (slot, url) in superseded {
            let asset_ref = match RemoteAssetRef::from_url(url, slot.category()) {
                Ok(asset_ref) => asset_ref,
                Err(e) => {
                    tracing::warn!(error = %e, url = %url, "Cannot derive superseded asset id");
                    continue;
                }
            };

            let operation = format!("superseded {} delete", slot.label());
            let outcome = within_limit(
                self.settings.remote_timeout,
                &operation,
                self.gateway.delete(&asset_ref.asset_id, asset_ref.category),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(asset_id = %asset_ref.asset_id, "Superseded asset deleted");
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, asset_id = %asset_ref.asset_id, "Failed to delete superseded asset");
                    leftovers.push(asset_ref);
                }
                Err(e) => {
                    tracing::warn!(error = %e, asset_id = %asset_ref.asset_id, "Superseded asset delete timed out");
                    leftovers.push(asset_ref);
                }
            }
        }

        if leftovers.is_empty() {
            return;
        }

        match self
            .intents
            .begin(IntentOperation::Retire, Some(book_id), leftovers)
            .await
        {
            Ok(retire) => {
                advance_intent(&self.intents, retire.id, IntentState::RollingBack, None).await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    book_id = %book_id,
                    "Failed to record superseded assets for reconciliation"
                );
            }
        }
    }
}

fn required_text(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn required_asset(
    slot: AssetSlot,
    asset: Option<&StagedAsset>,
) -> Result<&StagedAsset, AppError> {
    match asset {
        Some(asset) if !asset.mime_type.trim().is_empty() => Ok(asset),
        Some(_) => Err(AppError::Validation(format!(
            "{} has no mime type",
            slot.field_name()
        ))),
        None => Err(AppError::Validation(format!(
            "{} is required",
            slot.field_name()
        ))),
    }
}
