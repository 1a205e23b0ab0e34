//! Core types for windowed anomaly detection.

use std::fmt;

use chrono::{DateTime, Utc};
use pulse_logs::{LogLevel, NormalizedLogEvent};
use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};

/// Tunables for the windowed detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Number of past windows forming the baseline for a new count.
    pub window_size: usize,
    /// Absolute z-score above which a count is anomalous.
    pub z_score_threshold: f64,
    /// Maximum number of past window counts retained per key.
    pub history_size: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            z_score_threshold: 3.0,
            history_size: 1000,
        }
    }
}

impl DetectorConfig {
    /// Sets the baseline window size.
    #[must_use]
    pub const fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Sets the z-score threshold.
    #[must_use]
    pub const fn with_z_score_threshold(mut self, threshold: f64) -> Self {
        self.z_score_threshold = threshold;
        self
    }

    /// Sets the retained history length.
    #[must_use]
    pub const fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(DetectError::InvalidConfig {
                reason: "window_size must be greater than 0".to_string(),
            });
        }
        if self.history_size < self.window_size {
            return Err(DetectError::InvalidConfig {
                reason: format!(
                    "history_size ({}) must be at least window_size ({})",
                    self.history_size, self.window_size
                ),
            });
        }
        if !self.z_score_threshold.is_finite() || self.z_score_threshold <= 0.0 {
            return Err(DetectError::InvalidConfig {
                reason: "z_score_threshold must be a positive number".to_string(),
            });
        }
        Ok(())
    }
}

/// Identity of a counted stream: one service, level and template.
///
/// Unannotated events carry an empty `pattern_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnomalyKey {
    /// Emitting service.
    pub service_name: String,
    /// Severity of the counted events.
    pub log_level: LogLevel,
    /// Template identifier.
    pub pattern_id: String,
}

impl AnomalyKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        log_level: LogLevel,
        pattern_id: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            log_level,
            pattern_id: pattern_id.into(),
        }
    }

    /// Derives the key for an event.
    #[must_use]
    pub fn from_event(event: &NormalizedLogEvent) -> Self {
        Self::new(
            event.service_name.clone(),
            event.log_level,
            event.pattern_id.clone().unwrap_or_default(),
        )
    }
}

impl fmt::Display for AnomalyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.service_name, self.log_level, self.pattern_id
        )
    }
}

/// Kind of deviation detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    /// A jump away from a perfectly constant baseline.
    FrequencySpike,
    /// A count far above a varying baseline.
    HighFrequency,
    /// A count far below a varying baseline.
    LowFrequency,
}

impl AnomalyType {
    /// Human-readable name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FrequencySpike => "Frequency Spike",
            Self::HighFrequency => "High Frequency",
            Self::LowFrequency => "Low Frequency",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far a count strays from its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    /// Small deviation.
    Low,
    /// Notable deviation.
    Medium,
    /// Severe deviation.
    High,
}

impl fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

/// A statistically significant deviation for one key in one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Kind of deviation.
    pub anomaly_type: AnomalyType,
    /// The deviating stream.
    pub key: AnomalyKey,
    /// Last template text seen for the key in the window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Count observed in the window.
    pub current_count: u64,
    /// Mean of the baseline windows.
    pub baseline_mean: f64,
    /// Z-score, absent for constant baselines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    /// Severity.
    pub severity: AnomalySeverity,
    /// Human-readable explanation.
    pub details: String,
    /// When the anomaly was registered; unset when fresh from the detector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AnomalyRecord {
    /// Sets the registration timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the template text.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}
