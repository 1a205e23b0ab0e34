//! Error types for pulsed.

use thiserror::Error;

/// Errors that can occur in daemon operations.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Detector error.
    #[error("detector error: {0}")]
    Detect(#[from] pulse_detect::DetectError),

    /// Correlation error.
    #[error("correlation error: {0}")]
    Correlate(#[from] pulse_correlate::CorrelateError),

    /// Alerting error.
    #[error("alerting error: {0}")]
    Alert(#[from] pulse_alerts::AlertError),

    /// A pipeline task failed to complete.
    #[error("pipeline task failed: {0}")]
    Task(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;
