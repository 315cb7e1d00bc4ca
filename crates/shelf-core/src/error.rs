//! Error types module
//!
//! Every failure of the publishing pipeline is reported as one `AppError` kind. Step-local
//! failures (gateway calls, record store writes) are caught at their boundary and wrapped
//! with the kind and the underlying cause, so callers never see a raw backend error.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UPLOAD_FAILURE")
    fn error_code(&self) -> &'static str;

    /// Whether the caller may retry the whole operation
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A remote upload step failed; nothing was written to the record store.
    #[error("Upload failed: {message}")]
    UploadFailure {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// The record store write failed after the remote uploads succeeded.
    #[error("Persistence failed: {message}")]
    PersistenceFailure {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// A remote delete or the record delete failed during teardown.
    #[error("Deletion failed: {message}")]
    DeletionFailure {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Timed out after {timeout_secs}s: {operation}")]
    TimedOut { operation: String, timeout_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn upload_failure(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::UploadFailure {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn persistence_failure(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        AppError::PersistenceFailure {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn deletion_failure(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::DeletionFailure {
            message: message.into(),
            source: source.into(),
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::Validation(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Only the owner of this resource may modify it"),
            false,
            LogLevel::Debug,
        ),
        AppError::Validation(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the bearer token"),
            false,
            LogLevel::Debug,
        ),
        AppError::UploadFailure { .. } => (
            502,
            "UPLOAD_FAILURE",
            true,
            Some("Retry the whole request"),
            true,
            LogLevel::Error,
        ),
        AppError::PersistenceFailure { .. } => (
            500,
            "PERSISTENCE_FAILURE",
            true,
            Some("Retry the whole request"),
            true,
            LogLevel::Error,
        ),
        AppError::DeletionFailure { .. } => (
            502,
            "DELETION_FAILURE",
            true,
            Some("Retry the delete request"),
            true,
            LogLevel::Error,
        ),
        AppError::TimedOut { .. } => (
            504,
            "TIMED_OUT",
            true,
            Some("Retry the whole request"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "SERVER_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::NotFound(_) => "NotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Validation(_) => "Validation",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::UploadFailure { .. } => "UploadFailure",
            AppError::PersistenceFailure { .. } => "PersistenceFailure",
            AppError::DeletionFailure { .. } => "DeletionFailure",
            AppError::TimedOut { .. } => "TimedOut",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::Validation(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::UploadFailure { .. } => "Error while uploading files".to_string(),
            AppError::PersistenceFailure { .. } => "Error while publishing book".to_string(),
            AppError::DeletionFailure { .. } => "Error while deleting book".to_string(),
            AppError::TimedOut {
                operation,
                timeout_secs,
            } => format!("{} timed out after {}s", operation, timeout_secs),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("Book not found".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "Book not found");
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_forbidden() {
        let err = AppError::Forbidden("You cannot update others book".to_string());
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.error_code(), "FORBIDDEN");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_upload_failure_hides_cause_from_client() {
        let err = AppError::upload_failure(
            "cover image upload failed",
            anyhow::anyhow!("connection reset by peer"),
        );
        assert_eq!(err.http_status_code(), 502);
        assert_eq!(err.error_code(), "UPLOAD_FAILURE");
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Error while uploading files");
        assert!(err.detailed_message().contains("connection reset by peer"));
    }

    #[test]
    fn test_timed_out_metadata() {
        let err = AppError::TimedOut {
            operation: "cover image upload".to_string(),
            timeout_secs: 30,
        };
        assert_eq!(err.http_status_code(), 504);
        assert_eq!(err.error_code(), "TIMED_OUT");
        assert!(err.is_recoverable());
        assert!(err.client_message().contains("30s"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_persistence_and_deletion_failures_are_distinct() {
        let persist = AppError::persistence_failure("insert failed", anyhow::anyhow!("x"));
        let delete = AppError::deletion_failure("destroy failed", anyhow::anyhow!("y"));
        assert_eq!(persist.error_code(), "PERSISTENCE_FAILURE");
        assert_eq!(delete.error_code(), "DELETION_FAILURE");
        assert_eq!(persist.error_type(), "PersistenceFailure");
        assert_eq!(delete.error_type(), "DeletionFailure");
    }

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
    }
}
