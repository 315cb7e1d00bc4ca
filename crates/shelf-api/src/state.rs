//! Application state shared by the book handlers

use shelf_core::Config;
use shelf_services::{BookDeletionService, BookUploadService};
use std::path::PathBuf;
use std::sync::Arc;

/// Where and how large multipart files may be staged before transfer.
#[derive(Clone, Debug)]
pub struct StagingConfig {
    pub dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl StagingConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dir: config.assets.staging_dir.clone(),
            max_upload_bytes: config.assets.max_upload_bytes,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub upload_service: Arc<BookUploadService>,
    pub deletion_service: Arc<BookDeletionService>,
    pub staging: StagingConfig,
}
