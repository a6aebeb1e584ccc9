//! Error types module
//!
//! This module provides the core error types used throughout docshield.
//! All pipeline errors are unified under the `AppError` enum which covers pattern
//! registration, document format, page range, reputation, access and concurrency
//! failures plus the storage/database plumbing around them.
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
    /// Warning level - for recoverable issues like an unreachable reputation service
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// to the surrounding application, which owns the wire format.
pub trait ErrorMetadata {
    /// HTTP-style status code a caller may map the error to
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "OUT_OF_RANGE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried by the caller)
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
    #[error("Invalid pattern for rule '{rule_id}': {reason}")]
    InvalidPattern { rule_id: String, reason: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unprocessable document: {0}")]
    UnprocessableDocument(String),

    #[error("Page index {page_index} is out of range (document has {page_count} pages)")]
    OutOfRange { page_index: u32, page_count: u32 },

    #[error("Reputation service unavailable: {0}")]
    ReputationUnavailable(String),

    /// The inner reason is for operators only; clients always see a generic message.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
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
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// client_message stays per-variant for dynamic content.
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
        AppError::InvalidPattern { .. } => (
            400,
            "INVALID_PATTERN",
            false,
            Some("Fix the rule's expression so it compiles and cannot match empty text"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedFormat(_) => (
            415,
            "UNSUPPORTED_FORMAT",
            false,
            Some("Upload a PDF, PNG or JPEG document"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnprocessableDocument(_) => (
            422,
            "UNPROCESSABLE_DOCUMENT",
            false,
            Some("Check that the document is not corrupt or encrypted"),
            false,
            LogLevel::Warn,
        ),
        AppError::OutOfRange { .. } => (
            400,
            "OUT_OF_RANGE",
            false,
            Some("Use page indices reported by the document info call"),
            false,
            LogLevel::Debug,
        ),
        AppError::ReputationUnavailable(_) => (
            503,
            "REPUTATION_UNAVAILABLE",
            true,
            Some("Retry the upload scan later"),
            true,
            LogLevel::Warn,
        ),
        AppError::AccessDenied(_) => (
            403,
            "ACCESS_DENIED",
            false,
            None,
            true,
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            true,
            Some("Wait for the running redaction to finish and retry"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidStateTransition { .. } => (
            409,
            "INVALID_STATE_TRANSITION",
            false,
            Some("The document's safety state does not allow this operation"),
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
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
            AppError::InvalidPattern { .. } => "InvalidPattern",
            AppError::UnsupportedFormat(_) => "UnsupportedFormat",
            AppError::UnprocessableDocument(_) => "UnprocessableDocument",
            AppError::OutOfRange { .. } => "OutOfRange",
            AppError::ReputationUnavailable(_) => "ReputationUnavailable",
            AppError::AccessDenied(_) => "AccessDenied",
            AppError::Conflict(_) => "Conflict",
            AppError::InvalidStateTransition { .. } => "InvalidStateTransition",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Storage(_) => "Storage",
            AppError::Database(_) => "Database",
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
            AppError::InvalidPattern { rule_id, reason } => {
                format!("Rule '{}' has an invalid pattern: {}", rule_id, reason)
            }
            AppError::UnsupportedFormat(ref msg) => msg.clone(),
            AppError::UnprocessableDocument(ref msg) => msg.clone(),
            AppError::OutOfRange {
                page_index,
                page_count,
            } => format!(
                "Page {} does not exist (document has {} pages)",
                page_index, page_count
            ),
            AppError::ReputationUnavailable(_) => {
                "File safety could not be verified at this time".to_string()
            }
            AppError::AccessDenied(_) => "Invalid credential".to_string(),
            AppError::Conflict(ref msg) => msg.clone(),
            AppError::InvalidStateTransition { from, to } => {
                format!("Document cannot move from {} to {}", from, to)
            }
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_out_of_range() {
        let err = AppError::OutOfRange {
            page_index: 5,
            page_count: 3,
        };
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "OUT_OF_RANGE");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains('5'));
        assert!(err.to_string().contains("3 pages"));
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_access_denied_is_generic_for_clients() {
        let err = AppError::AccessDenied("MFA code rejected".to_string());
        assert_eq!(err.client_message(), "Invalid credential");
        assert!(!err.client_message().contains("MFA"));
        assert!(err.is_sensitive());
        assert_eq!(err.http_status_code(), 403);
    }

    #[test]
    fn test_reputation_unavailable_hides_provider_detail() {
        let err = AppError::ReputationUnavailable("HTTP 429: quota exceeded".to_string());
        assert!(!err.client_message().contains("429"));
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_invalid_pattern_names_rule() {
        let err = AppError::InvalidPattern {
            rule_id: "badge".to_string(),
            reason: "unclosed group".to_string(),
        };
        assert!(err.client_message().contains("badge"));
        assert_eq!(err.error_code(), "INVALID_PATTERN");
        assert_eq!(err.error_type(), "InvalidPattern");
    }

    #[test]
    fn test_detailed_message_includes_source() {
        let err = AppError::from(anyhow::anyhow!("disk full").context("writing scratch file"));
        let details = err.detailed_message();
        assert!(details.contains("writing scratch file"));
        assert_eq!(err.client_message(), "Internal server error");
    }
}
