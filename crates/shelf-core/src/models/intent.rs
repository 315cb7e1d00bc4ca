//! Durable record of a multi-step operation that spans remote storage and the record store.
//!
//! An intent is opened before the first side effect and advanced after each step. Anything
//! left in a non-terminal state is picked up by the reconciliation sweep, which either
//! compensates (deletes stranded remote assets or a ghost record) or marks it finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::asset::RemoteAssetRef;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "intent_operation", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum IntentOperation {
    /// Upload both assets then insert or update a record
    Publish,
    /// Delete both assets then the record
    Teardown,
    /// Delete assets superseded by an update
    Retire,
}

impl Display for IntentOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            IntentOperation::Publish => write!(f, "publish"),
            IntentOperation::Teardown => write!(f, "teardown"),
            IntentOperation::Retire => write!(f, "retire"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "intent_state", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    /// Opened, remote side not finished
    Pending,
    /// All remote steps finished, record step not yet committed
    RemoteCommitted,
    /// Record step committed; only follow-up cleanup may remain
    RecordCommitted,
    Done,
    /// Compensation requested for the recorded assets
    RollingBack,
    /// Nothing to compensate; the request died before any remote effect was confirmed
    Abandoned,
}

impl IntentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentState::Done | IntentState::Abandoned)
    }
}

impl Display for IntentState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            IntentState::Pending => write!(f, "pending"),
            IntentState::RemoteCommitted => write!(f, "remote_committed"),
            IntentState::RecordCommitted => write!(f, "record_committed"),
            IntentState::Done => write!(f, "done"),
            IntentState::RollingBack => write!(f, "rolling_back"),
            IntentState::Abandoned => write!(f, "abandoned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIntent {
    pub id: Uuid,
    pub operation: IntentOperation,
    pub state: IntentState,
    pub book_id: Option<Uuid>,
    /// Remote assets this intent may have to compensate
    pub assets: Vec<RemoteAssetRef>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetIntent {
    /// True if the intent was last touched longer than `grace_secs` ago.
    pub fn is_stale(&self, now: DateTime<Utc>, grace_secs: i64) -> bool {
        now.signed_duration_since(self.updated_at).num_seconds() >= grace_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_terminal_states() {
        assert!(IntentState::Done.is_terminal());
        assert!(IntentState::Abandoned.is_terminal());
        assert!(!IntentState::Pending.is_terminal());
        assert!(!IntentState::RollingBack.is_terminal());
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let intent = AssetIntent {
            id: Uuid::new_v4(),
            operation: IntentOperation::Publish,
            state: IntentState::Pending,
            book_id: None,
            assets: vec![],
            attempts: 0,
            last_error: None,
            created_at: now - Duration::seconds(600),
            updated_at: now - Duration::seconds(120),
        };
        assert!(intent.is_stale(now, 60));
        assert!(!intent.is_stale(now, 300));
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&IntentState::RemoteCommitted).unwrap();
        assert_eq!(json, "\"remote_committed\"");
    }
}
