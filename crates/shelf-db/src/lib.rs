//! Shelf database layer
//!
//! PostgreSQL repositories for book records and the asset intent log.

pub mod db;

pub use db::{
    ensure_remote_url, AssetIntentRepository, BookRepository, PgAssetIntentRepository,
    PgBookRepository,
};
