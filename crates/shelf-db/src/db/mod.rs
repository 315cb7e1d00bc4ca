//! Database repositories for data access layer
//!
//! Each repository is exposed as an `async_trait` so orchestrators can run against the
//! PostgreSQL implementation in production and in-memory doubles in tests.
//
// Book records
pub mod book;
//
// Intent log for multi-system operations
pub mod intent;

pub use book::{ensure_remote_url, BookRepository, PgBookRepository};
pub use intent::{AssetIntentRepository, PgAssetIntentRepository};
