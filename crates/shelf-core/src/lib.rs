//! Shelf Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and remote asset
//! reference derivation shared by every Shelf component.

pub mod asset_backend;
pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use asset_backend::AssetBackend;
pub use config::{AssetConfig, BaseConfig, Config, ReconcileConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    is_remote_url, AssetCategory, AssetIntent, AssetSlot, Book, BookChanges, BookResponse,
    CreatedBookResponse, IntentOperation, IntentState, NewBook, RemoteAssetRef, StagedAsset,
};
