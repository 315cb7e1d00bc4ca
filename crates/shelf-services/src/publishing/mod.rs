//! Book asset publishing and teardown
//!
//! Creating, updating and deleting a book touches three systems with no joint transaction:
//! the local staging directory, the remote asset gateway and the record store. The
//! orchestrators here order the steps so that a record never points at a missing or local
//! asset, and write every step to the intent log so the reconciliation sweep can finish or
//! compensate whatever a failed request leaves behind.

pub mod deletion;
pub mod upload;

pub use deletion::BookDeletionService;
pub use upload::{BookUploadService, CreateBookInput, UpdateBookInput};

use shelf_core::{AppError, AssetSlot, Config, IntentState};
use shelf_db::AssetIntentRepository;
use shelf_storage::GatewayResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Namespaces and limits shared by the orchestrators
#[derive(Debug, Clone)]
pub struct PublishingSettings {
    pub cover_namespace: String,
    pub document_namespace: String,
    /// Upper bound for each individual gateway call
    pub remote_timeout: Duration,
}

impl PublishingSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cover_namespace: config.assets.cover_namespace.clone(),
            document_namespace: config.assets.document_namespace.clone(),
            remote_timeout: config.remote_call_timeout(),
        }
    }

    pub fn namespace_for(&self, slot: AssetSlot) -> &str {
        match slot {
            AssetSlot::CoverImage => &self.cover_namespace,
            AssetSlot::File => &self.document_namespace,
        }
    }
}

/// Run a gateway call under `limit`. Expiry is reported as `TimedOut`, the inner
/// gateway result is handed back untouched for the caller to classify.
pub(crate) async fn within_limit<T, F>(
    limit: Duration,
    operation: &str,
    call: F,
) -> Result<GatewayResult<T>, AppError>
where
    F: Future<Output = GatewayResult<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| AppError::TimedOut {
            operation: operation.to_string(),
            timeout_secs: limit.as_secs(),
        })
}

/// Advance an intent after its first write. Failures are logged only; the sweep works
/// from whatever state was last persisted.
pub(crate) async fn advance_intent(
    intents: &Arc<dyn AssetIntentRepository>,
    intent_id: Uuid,
    state: IntentState,
    book_id: Option<Uuid>,
) {
    if let Err(e) = intents.transition(intent_id, state, book_id).await {
        tracing::warn!(
            error = %e,
            intent_id = %intent_id,
            state = %state,
            "Failed to advance asset intent"
        );
    }
}

/// Failing to open an intent aborts the request before any side effect.
pub(crate) fn intent_open_failed(err: AppError) -> AppError {
    AppError::InternalWithSource {
        message: "Failed to open asset intent".to_string(),
        source: anyhow::Error::new(err),
    }
}
