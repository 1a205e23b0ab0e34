//! Error types for the pulse-alerts crate.

use thiserror::Error;

/// Errors that can occur while dispatching alerts.
#[derive(Debug, Error)]
pub enum AlertError {
    /// A channel was configured incorrectly.
    #[error("invalid channel configuration: {reason}")]
    InvalidChannel {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// Notification delivery failed.
    #[error("notification failed: {reason}")]
    NotificationFailed {
        /// The reason the notification failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
