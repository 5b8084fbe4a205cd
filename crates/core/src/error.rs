//! Error types for Grounded.
//!
//! This module defines a unified error enum that covers all error categories
//! in the service, including configuration, I/O, LLM, knowledge, prompt,
//! and backend source errors.

use thiserror::Error;

/// Unified error type for Grounded.
///
/// All fallible functions return `Result<T, AppError>`.
/// Nothing in the request path panics; failures are values.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// A backend data source could not be reached or answered with an error status
    #[error("Source error: {0}")]
    Source(String),

    /// An operation exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_prefixes() {
        let err = AppError::Source("orders-api unreachable".to_string());
        assert_eq!(err.to_string(), "Source error: orders-api unreachable");

        let err = AppError::Timeout("inventory-api after 5s".to_string());
        assert_eq!(err.to_string(), "Timed out: inventory-api after 5s");
    }

    #[test]
    fn test_from_serde_json() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
