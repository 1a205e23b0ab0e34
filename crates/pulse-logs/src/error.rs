//! Error types for log events and template recognition.

use thiserror::Error;

/// Errors that can occur while handling log events.
#[derive(Debug, Error)]
pub enum LogError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Parse error for log lines.
    #[error("parse error: {0}")]
    ParseError(String),
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = LogError::ParseError("bad timestamp".to_string());
        assert_eq!(err.to_string(), "parse error: bad timestamp");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("not json");
        assert!(json_err.is_err());
        let err: LogError = json_err.unwrap_err().into();
        assert!(matches!(err, LogError::Serialization(_)));
    }
}
