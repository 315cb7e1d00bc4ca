//! Remote asset gateway trait
//!
//! This module defines the AssetGateway trait that all storage backends must implement.

use crate::AssetBackend;
use async_trait::async_trait;
use shelf_core::AssetCategory;
use std::path::Path;
use thiserror::Error;

/// Gateway operation errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid asset id: {0}")]
    InvalidAssetId(String),

    #[error("Gateway backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[cfg(feature = "gateway-cloudinary")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Where and how a staged file is stored remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Name the asset is stored under (before the backend makes it unique)
    pub target_filename: String,
    /// Single path segment, e.g. `book-covers`
    pub namespace: String,
    /// Delivery format for images; ignored for raw assets
    pub format: Option<String>,
    pub category: AssetCategory,
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    /// Fully-qualified https (or http for local) URL of the stored asset
    pub secure_url: String,
    /// `<namespace>/<name>` identifier used for deletion
    pub asset_id: String,
}

/// Remote asset gateway abstraction
///
/// The orchestrators only talk to remote storage through this trait, so backends can be
/// swapped (Cloudinary, local filesystem, in-memory doubles in tests).
#[async_trait]
pub trait AssetGateway: Send + Sync {
    /// Upload the file at `local_path`. The local file is left untouched.
    async fn upload(
        &self,
        local_path: &Path,
        options: &UploadOptions,
    ) -> GatewayResult<UploadedAsset>;

    /// Delete an asset by id. Deleting an asset that no longer exists succeeds.
    async fn delete(&self, asset_id: &str, category: AssetCategory) -> GatewayResult<()>;

    /// Get the gateway backend type
    fn backend_type(&self) -> AssetBackend;
}
