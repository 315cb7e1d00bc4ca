pub mod service;

pub use service::{ReconciliationService, SweepReport};
