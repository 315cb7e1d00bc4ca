#[cfg(feature = "gateway-cloudinary")]
use crate::CloudinaryGateway;
#[cfg(feature = "gateway-local")]
use crate::LocalGateway;
use crate::{AssetBackend, AssetGateway, GatewayError, GatewayResult};
use shelf_core::Config;
use std::sync::Arc;

/// Create a remote asset gateway based on configuration
pub async fn create_gateway(config: &Config) -> GatewayResult<Arc<dyn AssetGateway>> {
    let assets = &config.assets;

    match assets.backend {
        #[cfg(feature = "gateway-cloudinary")]
        AssetBackend::Cloudinary => {
            let cloud_name = assets.cloudinary_cloud_name.clone().ok_or_else(|| {
                GatewayError::ConfigError("CLOUDINARY_CLOUD_NAME not configured".to_string())
            })?;
            let api_key = assets.cloudinary_api_key.clone().ok_or_else(|| {
                GatewayError::ConfigError("CLOUDINARY_API_KEY not configured".to_string())
            })?;
            let api_secret = assets.cloudinary_api_secret.clone().ok_or_else(|| {
                GatewayError::ConfigError("CLOUDINARY_API_SECRET not configured".to_string())
            })?;

            let gateway = CloudinaryGateway::new(cloud_name, api_key, api_secret)?;
            Ok(Arc::new(gateway))
        }

        #[cfg(not(feature = "gateway-cloudinary"))]
        AssetBackend::Cloudinary => Err(GatewayError::ConfigError(
            "Cloudinary gateway not available (gateway-cloudinary feature not enabled)".to_string(),
        )),

        #[cfg(feature = "gateway-local")]
        AssetBackend::Local => {
            let base_path = assets.local_asset_path.clone().ok_or_else(|| {
                GatewayError::ConfigError("LOCAL_ASSET_PATH not configured".to_string())
            })?;
            let base_url = assets.local_asset_base_url.clone().ok_or_else(|| {
                GatewayError::ConfigError("LOCAL_ASSET_BASE_URL not configured".to_string())
            })?;

            let gateway = LocalGateway::new(base_path, base_url).await?;
            Ok(Arc::new(gateway))
        }

        #[cfg(not(feature = "gateway-local"))]
        AssetBackend::Local => Err(GatewayError::ConfigError(
            "Local gateway not available (gateway-local feature not enabled)".to_string(),
        )),
    }
}
