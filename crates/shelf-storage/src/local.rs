use crate::traits::{AssetGateway, GatewayError, GatewayResult, UploadOptions, UploadedAsset};
use crate::AssetBackend;
use async_trait::async_trait;
use shelf_core::AssetCategory;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Local filesystem gateway
///
/// Stores assets under `base_path/<namespace>/<stem>_<8 hex>.<ext>` and serves them from
/// `base_url`. Meant for development and single-node deployments.
#[derive(Clone)]
pub struct LocalGateway {
    base_path: PathBuf,
    base_url: String,
}

impl LocalGateway {
    /// Create a new LocalGateway instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for stored assets (e.g., "/var/lib/shelf/assets")
    /// * `base_url` - Base URL for serving assets (e.g., "http://localhost:3000/assets")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> GatewayResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            GatewayError::ConfigError(format!(
                "Failed to create asset directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalGateway {
            base_path,
            base_url,
        })
    }

    /// Convert an object key to a filesystem path, rejecting traversal.
    fn key_to_path(&self, key: &str) -> GatewayResult<PathBuf> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(GatewayError::InvalidAssetId(format!(
                "Asset id contains invalid characters: {}",
                key
            )));
        }
        Ok(self.base_path.join(key))
    }

    /// Keep filename-safe characters of the target name's stem.
    fn sanitize_stem(name: &str) -> String {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let cleaned: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() {
            "asset".to_string()
        } else {
            cleaned
        }
    }

    fn extension_for(options: &UploadOptions) -> Option<String> {
        let original = Path::new(&options.target_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match options.category {
            AssetCategory::Image => options.format.clone().or(original),
            AssetCategory::Raw => original.or_else(|| options.format.clone()),
        }
    }

    /// Build the object key and the asset id for an upload.
    fn generate_key(options: &UploadOptions) -> (String, String) {
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}_{}",
            Self::sanitize_stem(&options.target_filename),
            &suffix[..8]
        );
        let base = format!("{}/{}", options.namespace.trim_matches('/'), name);

        let key = match Self::extension_for(options) {
            Some(ext) if !ext.is_empty() => format!("{}.{}", base, ext),
            _ => base.clone(),
        };

        let asset_id = match options.category {
            AssetCategory::Image => base,
            AssetCategory::Raw => key.clone(),
        };
        (key, asset_id)
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Resolve an image id (no extension) to the stored file, if any.
    async fn find_image(&self, asset_id: &str) -> GatewayResult<Option<PathBuf>> {
        let id_path = self.key_to_path(asset_id)?;
        let (dir, name) = match (id_path.parent(), id_path.file_name().and_then(|n| n.to_str())) {
            (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_string()),
            _ => return Ok(None),
        };

        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(None);
        }

        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let stem_matches = path.file_stem().and_then(|s| s.to_str()) == Some(name.as_str());
            if stem_matches || path.file_name().and_then(|s| s.to_str()) == Some(name.as_str()) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl AssetGateway for LocalGateway {
    async fn upload(
        &self,
        local_path: &Path,
        options: &UploadOptions,
    ) -> GatewayResult<UploadedAsset> {
        if options.namespace.trim_matches('/').is_empty() || options.namespace.contains('/') {
            return Err(GatewayError::ConfigError(format!(
                "Namespace must be a single path segment: {}",
                options.namespace
            )));
        }

        let (key, asset_id) = Self::generate_key(options);
        let path = self.key_to_path(&key)?;
        let start = std::time::Instant::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let size = fs::copy(local_path, &path).await.map_err(|e| {
            GatewayError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                local_path.display(),
                path.display(),
                e
            ))
        })?;

        let url = self.generate_url(&key);

        tracing::info!(
            path = %path.display(),
            asset_id = %asset_id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local gateway upload successful"
        );

        Ok(UploadedAsset {
            secure_url: url,
            asset_id,
        })
    }

    async fn delete(&self, asset_id: &str, category: AssetCategory) -> GatewayResult<()> {
        let start = std::time::Instant::now();

        let path = match category {
            AssetCategory::Raw => {
                let path = self.key_to_path(asset_id)?;
                if fs::try_exists(&path).await.unwrap_or(false) {
                    Some(path)
                } else {
                    None
                }
            }
            AssetCategory::Image => self.find_image(asset_id).await?,
        };

        let Some(path) = path else {
            tracing::debug!(asset_id = %asset_id, "Local asset already gone");
            return Ok(());
        };

        fs::remove_file(&path).await.map_err(|e| {
            GatewayError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            asset_id = %asset_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local gateway delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> AssetBackend {
        AssetBackend::Local
    }
}
