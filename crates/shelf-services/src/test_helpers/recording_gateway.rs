//! Remote gateway double that records every call

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use shelf_core::{AssetBackend, AssetCategory, RemoteAssetRef};
use shelf_storage::{AssetGateway, GatewayError, GatewayResult, UploadOptions, UploadedAsset};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const URL_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

#[derive(Default)]
struct GatewayState {
    stored: HashSet<RemoteAssetRef>,
    upload_attempts: Vec<AssetCategory>,
    uploaded: Vec<AssetCategory>,
    delete_attempts: Vec<AssetCategory>,
    deleted: Vec<RemoteAssetRef>,
    failing_uploads: HashSet<AssetCategory>,
    failing_deletes: HashSet<AssetCategory>,
    upload_delay: Option<Duration>,
    sequence: u64,
}

/// Stores uploads in memory and serves URLs under `https://assets.test`.
///
/// URLs follow the `<category>/upload/v1/<namespace>/<file>` layout, so asset ids can be
/// derived back from them the same way as for production URLs.
#[derive(Default)]
pub struct RecordingGateway {
    state: Mutex<GatewayState>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend an asset already exists remotely.
    pub fn store(&self, asset: RemoteAssetRef) {
        self.state.lock().unwrap().stored.insert(asset);
    }

    pub fn is_stored(&self, asset: &RemoteAssetRef) -> bool {
        self.state.lock().unwrap().stored.contains(asset)
    }

    pub fn stored_count(&self) -> usize {
        self.state.lock().unwrap().stored.len()
    }

    pub fn fail_uploads_for(&self, category: AssetCategory) {
        self.state.lock().unwrap().failing_uploads.insert(category);
    }

    pub fn fail_deletes_for(&self, category: AssetCategory) {
        self.state.lock().unwrap().failing_deletes.insert(category);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_uploads.clear();
        state.failing_deletes.clear();
    }

    /// Delay every upload, for timeout tests.
    pub fn set_upload_delay(&self, delay: Duration) {
        self.state.lock().unwrap().upload_delay = Some(delay);
    }

    /// Successful uploads
    pub fn upload_count(&self) -> usize {
        self.state.lock().unwrap().uploaded.len()
    }

    pub fn upload_attempts(&self, category: AssetCategory) -> usize {
        self.state
            .lock()
            .unwrap()
            .upload_attempts
            .iter()
            .filter(|c| **c == category)
            .count()
    }

    /// Categories of successful uploads, in call order.
    pub fn uploaded_categories(&self) -> Vec<AssetCategory> {
        self.state.lock().unwrap().uploaded.clone()
    }

    /// Successful deletes, including deletes of assets that were already gone.
    pub fn delete_count(&self) -> usize {
        self.state.lock().unwrap().deleted.len()
    }

    pub fn delete_attempts(&self, category: AssetCategory) -> usize {
        self.state
            .lock()
            .unwrap()
            .delete_attempts
            .iter()
            .filter(|c| **c == category)
            .count()
    }

    pub fn deleted(&self) -> Vec<RemoteAssetRef> {
        self.state.lock().unwrap().deleted.clone()
    }

    fn extension_for(options: &UploadOptions) -> Option<String> {
        let original = Path::new(&options.target_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match options.category {
            AssetCategory::Image => options.format.clone().or(original),
            AssetCategory::Raw => original,
        }
    }
}

#[async_trait]
impl AssetGateway for RecordingGateway {
    async fn upload(
        &self,
        local_path: &Path,
        options: &UploadOptions,
    ) -> GatewayResult<UploadedAsset> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.upload_attempts.push(options.category);
            state.upload_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        tokio::fs::metadata(local_path).await?;

        let mut state = self.state.lock().unwrap();
        if state.failing_uploads.contains(&options.category) {
            return Err(GatewayError::UploadFailed(format!(
                "simulated {} upload failure",
                options.category
            )));
        }

        state.sequence += 1;
        let stem = Path::new(&options.target_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("asset");
        let name = format!("{}_{}", stem, state.sequence);
        let file = match Self::extension_for(options) {
            Some(ext) => format!("{}.{}", name, ext),
            None => name.clone(),
        };
        let asset_id = match options.category {
            AssetCategory::Image => format!("{}/{}", options.namespace, name),
            AssetCategory::Raw => format!("{}/{}", options.namespace, file),
        };

        state
            .stored
            .insert(RemoteAssetRef::new(asset_id.clone(), options.category));
        state.uploaded.push(options.category);

        // Served URLs carry the name percent-encoded, as real CDNs do.
        Ok(UploadedAsset {
            secure_url: format!(
                "https://assets.test/{}/upload/v1/{}/{}",
                options.category,
                options.namespace,
                utf8_percent_encode(&file, URL_SEGMENT)
            ),
            asset_id,
        })
    }

    async fn delete(&self, asset_id: &str, category: AssetCategory) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.delete_attempts.push(category);
        if state.failing_deletes.contains(&category) {
            return Err(GatewayError::DeleteFailed(format!(
                "simulated {} delete failure",
                category
            )));
        }

        let asset = RemoteAssetRef::new(asset_id, category);
        state.stored.remove(&asset);
        state.deleted.push(asset);
        Ok(())
    }

    fn backend_type(&self) -> AssetBackend {
        AssetBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_url_derives_back_to_asset_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged");
        std::fs::write(&path, b"data").unwrap();
        let gateway = RecordingGateway::new();

        for (category, name, format) in [
            (AssetCategory::Image, "cover.jpg", Some("jpeg")),
            (AssetCategory::Raw, "novel.pdf", Some("pdf")),
            (AssetCategory::Image, "café.jpg", Some("jpeg")),
            (AssetCategory::Raw, "mon roman.pdf", Some("pdf")),
        ] {
            let uploaded = gateway
                .upload(
                    &path,
                    &UploadOptions {
                        target_filename: name.to_string(),
                        namespace: "ns".to_string(),
                        format: format.map(String::from),
                        category,
                    },
                )
                .await
                .unwrap();
            let derived = RemoteAssetRef::from_url(&uploaded.secure_url, category).unwrap();
            assert_eq!(derived.asset_id, uploaded.asset_id);
            assert!(gateway.is_stored(&derived));
        }
    }
}
