//! Shelf Services Layer
//!
//! This crate is the **business service layer**: it hosts the book publishing and teardown
//! orchestration, the ownership check and the background reconciliation of the intent log.
//! Keep orchestration here; keep thin HTTP handling in shelf-api.

pub mod ownership;
pub mod publishing;
pub mod reconcile;
pub mod staging;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use ownership::ensure_owner;
pub use publishing::{
    BookDeletionService, BookUploadService, CreateBookInput, PublishingSettings, UpdateBookInput,
};
pub use reconcile::{ReconciliationService, SweepReport};
pub use staging::release_staged;
