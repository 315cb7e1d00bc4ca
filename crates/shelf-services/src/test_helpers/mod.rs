//! Test helpers for orchestrator and HTTP tests
//!
//! In-memory implementations of the record store, the intent log and the remote gateway,
//! with call recording and failure injection. No database or network is needed.

pub mod fixtures;
pub mod memory_repositories;
pub mod recording_gateway;

pub use memory_repositories::{MemoryBookRepository, MemoryIntentLog};
pub use recording_gateway::RecordingGateway;
