//! Shelf API Library
//!
//! This crate provides the HTTP handlers, bearer authentication, multipart staging and
//! application setup for the book publishing service.

mod handlers;
pub mod setup;
mod telemetry;
mod utils;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::{AppState, StagingConfig};
