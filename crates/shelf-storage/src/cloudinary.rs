use crate::traits::{AssetGateway, GatewayError, GatewayResult, UploadOptions, UploadedAsset};
use crate::AssetBackend;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use shelf_core::AssetCategory;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use tokio::fs;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

/// Cloudinary REST gateway
///
/// Uploads are signed with SHA-256 over the alphabetically sorted parameters. The public id
/// is generated by Cloudinary from the target filename plus a random suffix, which keeps
/// delivery URLs in the `<folder>/<public id>.<format>` shape the reference derivation expects.
#[derive(Clone)]
pub struct CloudinaryGateway {
    http_client: Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl Debug for CloudinaryGateway {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CloudinaryGateway")
            .field("cloud_name", &self.cloud_name)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryGateway {
    /// Create a new CloudinaryGateway instance
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> GatewayResult<Self> {
        Self::with_api_base(DEFAULT_API_BASE.to_string(), cloud_name, api_key, api_secret)
    }

    /// Same as `new` but against another API host (used by tests)
    pub fn with_api_base(
        api_base: String,
        cloud_name: String,
        api_key: String,
        api_secret: String,
    ) -> GatewayResult<Self> {
        if cloud_name.is_empty() || api_key.is_empty() || api_secret.is_empty() {
            return Err(GatewayError::ConfigError(
                "Cloudinary cloud name, API key and API secret must not be empty".to_string(),
            ));
        }

        let http_client = Client::builder().build().map_err(|e| {
            GatewayError::ConfigError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            cloud_name,
            api_key,
            api_secret,
        })
    }

    fn endpoint(&self, category: AssetCategory, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.api_base,
            self.cloud_name,
            category.as_str(),
            action
        )
    }

    /// Signature over `params`: sorted `k=v` pairs joined with `&`, secret appended, SHA-256 hex.
    fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn signed_form(&self, params: Vec<(&'static str, String)>) -> Form {
        let signature = self.sign(&params);
        let mut form = Form::new();
        for (key, value) in params {
            form = form.text(key, value);
        }
        form.text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
    }

    async fn error_text(response: reqwest::Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string())
    }
}

#[async_trait]
impl AssetGateway for CloudinaryGateway {
    async fn upload(
        &self,
        local_path: &Path,
        options: &UploadOptions,
    ) -> GatewayResult<UploadedAsset> {
        let start = std::time::Instant::now();

        let data = fs::read(local_path).await.map_err(|e| {
            GatewayError::UploadFailed(format!(
                "Failed to read staged file {}: {}",
                local_path.display(),
                e
            ))
        })?;
        let size = data.len();

        let mut params: Vec<(&'static str, String)> = vec![
            ("filename_override", options.target_filename.clone()),
            ("folder", options.namespace.clone()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
            ("unique_filename", "true".to_string()),
            ("use_filename", "true".to_string()),
        ];
        if options.category == AssetCategory::Image {
            if let Some(ref format) = options.format {
                params.push(("format", format.clone()));
            }
        }

        let part = Part::bytes(data).file_name(options.target_filename.clone());
        let form = self.signed_form(params).part("file", part);

        let response = self
            .http_client
            .post(self.endpoint(options.category, "upload"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = Self::error_text(response).await;
            return Err(GatewayError::UploadFailed(format!(
                "Cloudinary upload failed: {} - {}",
                status, error_text
            )));
        }

        let body: UploadResponse = response.json().await.map_err(|e| {
            GatewayError::BackendError(format!("Failed to parse upload response: {}", e))
        })?;

        tracing::info!(
            asset_id = %body.public_id,
            category = %options.category,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloudinary upload successful"
        );

        Ok(UploadedAsset {
            secure_url: body.secure_url,
            asset_id: body.public_id,
        })
    }

    async fn delete(&self, asset_id: &str, category: AssetCategory) -> GatewayResult<()> {
        if asset_id.is_empty() {
            return Err(GatewayError::InvalidAssetId("empty asset id".to_string()));
        }

        let start = std::time::Instant::now();

        let params: Vec<(&'static str, String)> = vec![
            ("public_id", asset_id.to_string()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];

        let response = self
            .http_client
            .post(self.endpoint(category, "destroy"))
            .multipart(self.signed_form(params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = Self::error_text(response).await;
            return Err(GatewayError::DeleteFailed(format!(
                "Cloudinary destroy failed: {} - {}",
                status, error_text
            )));
        }

        let body: DestroyResponse = response.json().await.map_err(|e| {
            GatewayError::BackendError(format!("Failed to parse destroy response: {}", e))
        })?;

        match body.result.as_str() {
            "ok" => {
                tracing::info!(
                    asset_id = %asset_id,
                    category = %category,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Cloudinary delete successful"
                );
                Ok(())
            }
            "not found" => {
                tracing::debug!(
                    asset_id = %asset_id,
                    category = %category,
                    "Cloudinary asset already gone"
                );
                Ok(())
            }
            other => Err(GatewayError::DeleteFailed(format!(
                "Cloudinary destroy returned '{}' for {}",
                other, asset_id
            ))),
        }
    }

    fn backend_type(&self) -> AssetBackend {
        AssetBackend::Cloudinary
    }
}
