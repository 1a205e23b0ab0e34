//! Error types for the pulse-correlate crate.

use thiserror::Error;

/// Errors that can occur during incident correlation.
#[derive(Debug, Error)]
pub enum CorrelateError {
    /// Invalid incident rule.
    #[error("invalid incident rule: {reason}")]
    InvalidRule {
        /// The reason the rule is invalid.
        reason: String,
    },

    /// A rule could not be evaluated.
    #[error("rule evaluation failed: {reason}")]
    EvaluationError {
        /// The reason the evaluation failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CorrelateError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for correlation operations.
pub type Result<T> = std::result::Result<T, CorrelateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CorrelateError::InvalidRule {
            reason: "rule name cannot be empty".to_string(),
        };
        assert_eq!(err.to_string(), "invalid incident rule: rule name cannot be empty");

        let err = CorrelateError::EvaluationError {
            reason: "time window out of range".to_string(),
        };
        assert_eq!(err.to_string(), "rule evaluation failed: time window out of range");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CorrelateError = json_err.into();
        assert!(matches!(err, CorrelateError::SerializationError(_)));
    }
}
