//! Shelf Storage Library
//!
//! This crate provides the remote asset gateway abstraction and its implementations.
//! It includes the `AssetGateway` trait, a Cloudinary backend and a local filesystem backend.
//!
//! # Asset identifiers
//!
//! All backends address an asset as `<namespace>/<name>` and serve it from a URL ending in
//! the same two segments. Image ids carry no extension (the URL adds the delivery format),
//! raw ids keep the original extension. See `shelf_core::RemoteAssetRef::from_url`.

#[cfg(feature = "gateway-cloudinary")]
pub mod cloudinary;
pub mod factory;
#[cfg(feature = "gateway-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "gateway-cloudinary")]
pub use cloudinary::CloudinaryGateway;
pub use factory::create_gateway;
#[cfg(feature = "gateway-local")]
pub use local::LocalGateway;
pub use shelf_core::AssetBackend;
pub use traits::{AssetGateway, GatewayError, GatewayResult, UploadOptions, UploadedAsset};
