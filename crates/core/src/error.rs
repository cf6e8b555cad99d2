//! Error types for the tariff RAG workspace.
//!
//! A single error enum covers every category the search stack can raise:
//! configuration, I/O, model invocation, context building, prompt
//! formatting and serialization.

use thiserror::Error;

/// Unified error type.
///
/// Library functions return `Result<T, AppError>` and never panic.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Language-model invocation errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Context building (retrieval) errors
    #[error("Context error: {0}")]
    Context(String),

    /// Prompt loading and formatting errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error belongs to the generation side of a search call
    /// (prompt formatting or model invocation).
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, AppError::Llm(_) | AppError::Prompt(_))
    }
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
    fn test_generation_failure_classification() {
        assert!(AppError::Llm("boom".into()).is_generation_failure());
        assert!(AppError::Prompt("bad marker".into()).is_generation_failure());
        assert!(!AppError::Context("no tables".into()).is_generation_failure());
        assert!(!AppError::Config("x".into()).is_generation_failure());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_display_includes_category() {
        let err = AppError::Context("missing table".to_string());
        assert_eq!(err.to_string(), "Context error: missing table");
    }
}
