//! Error types for the pulse-detect crate.

use thiserror::Error;

/// Errors that can occur in anomaly detection.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Not enough history to form a baseline.
    #[error("insufficient baseline data: need {needed} samples, have {have}")]
    InsufficientBaseline {
        /// Number of samples required.
        needed: usize,
        /// Number of samples available.
        have: usize,
    },

    /// Invalid detector configuration.
    #[error("invalid detector config: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

/// Result type for detection operations.
pub type Result<T> = std::result::Result<T, DetectError>;
