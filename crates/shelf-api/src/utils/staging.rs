//! Multipart staging
//!
//! File fields are streamed to the staging directory under random names. Text fields are
//! read in memory. The orchestrators take ownership of the staged files from here on.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use shelf_core::{AppError, AssetSlot, StagedAsset};
use shelf_services::release_staged;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::state::StagingConfig;

/// Text fields and staged files of a book form
#[derive(Debug, Default)]
pub struct StagedForm {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub cover_image: Option<StagedAsset>,
    pub file: Option<StagedAsset>,
}

impl StagedForm {
    fn staged(&self) -> impl Iterator<Item = &StagedAsset> {
        self.cover_image.iter().chain(self.file.iter())
    }

    fn slot_mut(&mut self, slot: AssetSlot) -> &mut Option<StagedAsset> {
        match slot {
            AssetSlot::CoverImage => &mut self.cover_image,
            AssetSlot::File => &mut self.file,
        }
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::Validation(format!("Failed to read multipart: {}", err.body_text()))
    }
}

fn slot_for(field_name: &str) -> Option<AssetSlot> {
    [AssetSlot::CoverImage, AssetSlot::File]
        .into_iter()
        .find(|slot| slot.field_name() == field_name)
}

/// Read a book form, staging its file fields. On error every file already staged for the
/// request is removed.
pub async fn stage_multipart(
    mut multipart: Multipart,
    config: &StagingConfig,
) -> Result<StagedForm, AppError> {
    let mut form = StagedForm::default();
    match read_fields(&mut multipart, config, &mut form).await {
        Ok(()) => Ok(form),
        Err(e) => {
            release_staged(form.staged()).await;
            Err(e)
        }
    }
}

async fn read_fields(
    multipart: &mut Multipart,
    config: &StagingConfig,
    form: &mut StagedForm,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        if let Some(slot) = slot_for(&field_name) {
            if form.slot_mut(slot).is_some() {
                return Err(AppError::Validation(format!(
                    "Multiple {} fields are not allowed",
                    field_name
                )));
            }
            let staged = stage_file(field, config).await?;
            *form.slot_mut(slot) = Some(staged);
            continue;
        }

        match field_name.as_str() {
            "title" => form.title = Some(field.text().await.map_err(multipart_error)?),
            "genre" => form.genre = Some(field.text().await.map_err(multipart_error)?),
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }
    Ok(())
}

async fn stage_file(mut field: Field<'_>, config: &StagingConfig) -> Result<StagedAsset, AppError> {
    let original_filename = field
        .file_name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let mime_type = field.content_type().map(|s| s.to_string()).unwrap_or_default();

    let path = config.dir.join(Uuid::new_v4().to_string());
    let mut file = tokio::fs::File::create(&path).await?;
    let staged = StagedAsset::new(path, mime_type, original_filename);

    let mut written = 0usize;
    let copied: Result<(), AppError> = async {
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            written += chunk.len();
            if written > config.max_upload_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "File size exceeds maximum allowed size of {} MB",
                    config.max_upload_bytes / 1024 / 1024
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = copied {
        drop(file);
        release_staged(std::iter::once(&staged)).await;
        return Err(e);
    }

    tracing::debug!(
        path = %staged.path.display(),
        size_bytes = written,
        mime_type = %staged.mime_type,
        "Staged multipart file"
    );
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_for_known_fields() {
        assert_eq!(slot_for("coverImage"), Some(AssetSlot::CoverImage));
        assert_eq!(slot_for("file"), Some(AssetSlot::File));
        assert_eq!(slot_for("title"), None);
        assert_eq!(slot_for("cover_image"), None);
    }
}
