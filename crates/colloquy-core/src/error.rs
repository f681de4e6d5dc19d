//! Error types for colloquy.

use thiserror::Error;

/// Result type alias using colloquy's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for colloquy operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Scheduled task not found (or not owned by the caller)
    #[error("Task not found: {0}")]
    TaskNotFound(uuid::Uuid),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Task is in a state that does not allow the requested transition
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Monthly quota denied the request
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// No catalog model satisfies the request under the active policy
    #[error("No compatible model: {0}")]
    NoCompatibleModel(String),

    /// Model provider call failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("persona".to_string());
        assert_eq!(err.to_string(), "Not found: persona");
    }

    #[test]
    fn test_error_display_task_not_found() {
        let id = Uuid::nil();
        let err = Error::TaskNotFound(id);
        assert_eq!(err.to_string(), format!("Task not found: {}", id));
    }

    #[test]
    fn test_error_display_quota_exceeded() {
        let err = Error::QuotaExceeded("API call limit exceeded".to_string());
        assert_eq!(err.to_string(), "Quota exceeded: API call limit exceeded");
    }

    #[test]
    fn test_error_display_no_compatible_model() {
        let err = Error::NoCompatibleModel("vision at free".to_string());
        assert_eq!(err.to_string(), "No compatible model: vision at free");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
