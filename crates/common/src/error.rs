//! Error types for ForgeHook
//!
//! Custom error enum that wraps all possible error types in the subsystem.

use thiserror::Error;

/// Main error type for ForgeHook operations
#[derive(Debug, Error)]
pub enum Error {
    /// Database errors (SQLite via sqlx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation errors (payload shape, target URL, payload size)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller does not own the subject webhook
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// External service errors (outbound HTTP)
    #[error("External service error: {0}")]
    External(String),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for ForgeHook operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("events must not be empty".to_string());
        assert_eq!(err.to_string(), "Validation error: events must not be empty");
    }

    #[test]
    fn test_error_conversion() {
        let sql_err = sqlx::Error::RowNotFound;
        let our_err: Error = sql_err.into();
        assert!(matches!(our_err, Error::Database(_)));
    }
}
