//! Error types for the grounded retrieval pipeline.
//!
//! This module defines a unified error enum covering configuration, schema,
//! query construction, collaborator failures (search and completion), and
//! prompt templates.

use thiserror::Error;

/// Unified error type for the grounded pipeline.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Soft outcomes (partial upload failures, a reconciliation that gave up)
/// are reported as data, never as an `AppError`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (missing environment, bad config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Index schema failed validation
    #[error("Invalid index schema: {0}")]
    InvalidSchema(String),

    /// Query specification rejected by the query builder (caller error)
    #[error("Invalid query specification: {0}")]
    InvalidQuerySpec(String),

    /// Search collaborator failed after its own retry policy
    #[error("Search service unavailable: {0}")]
    SearchUnavailable(String),

    /// Generation collaborator failed
    #[error("Completion service unavailable: {0}")]
    CompletionUnavailable(String),

    /// Prompt template is malformed
    #[error("Template error: {0}")]
    Template(String),

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
        let err = AppError::InvalidQuerySpec("unknown field 'Foo'".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid query specification: unknown field 'Foo'"
        );

        let err = AppError::SearchUnavailable("timeout".to_string());
        assert!(err.to_string().starts_with("Search service unavailable"));
    }

    #[test]
    fn test_from_serde_json() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
