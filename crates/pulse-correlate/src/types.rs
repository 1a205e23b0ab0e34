//! Core types for incident correlation.
//!
//! - [`IncidentSeverity`]: How urgent a predicted incident is
//! - [`Likelihood`]: How confident the prediction is
//! - [`PredictedIncident`]: The output of a firing rule
//! - [`CorrelatorConfig`]: Engine tunables
//! - [`EvaluationResult`]: Counters for one evaluation pass

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a predicted incident.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentSeverity {
    /// Immediate action required; pages on-call.
    Critical,
    /// Urgent.
    High,
    /// Should be looked at soon.
    #[default]
    Medium,
    /// Low urgency.
    Low,
    /// Informational.
    Info,
    /// A previously predicted incident has cleared.
    Resolved,
}

impl IncidentSeverity {
    /// Returns the upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Info => "INFO",
            Self::Resolved => "RESOLVED",
        }
    }

    /// Returns the priority of this severity (higher = more urgent).
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Resolved => 0,
            Self::Info => 1,
            Self::Low => 2,
            Self::Medium => 3,
            Self::High => 4,
            Self::Critical => 5,
        }
    }
}

impl std::fmt::Display for IncidentSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence in a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Likelihood {
    /// Strong evidence.
    High,
    /// Partial evidence.
    Medium,
    /// Weak evidence.
    Low,
}

impl std::fmt::Display for Likelihood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        };
        f.write_str(s)
    }
}

/// An incident predicted by a firing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedIncident {
    /// Identifier derived from the evaluation time, `PRED-YYYYmmdd-HHMMSS`.
    pub alert_id: String,
    /// Evaluation time.
    pub timestamp: DateTime<Utc>,
    /// Severity taken from the rule.
    pub severity: IncidentSeverity,
    /// Confidence.
    pub likelihood: Likelihood,
    /// Expected impact taken from the rule.
    pub predicted_impact: String,
    /// Services involved, in first-seen order.
    pub affected_components: Vec<String>,
    /// Human-readable root cause.
    pub root_cause: String,
    /// Supporting data.
    pub contextual_data: serde_json::Value,
    /// Suggested next steps.
    pub recommended_actions: Vec<String>,
    /// Name of the rule that fired.
    pub rule_name: String,
}

/// Configuration for the correlation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// An incident repeats only once its key last fired more than this many
    /// seconds ago.
    pub incident_suppression_secs: u64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            incident_suppression_secs: 300,
        }
    }
}

/// Counters for one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationResult {
    /// Number of rules evaluated.
    pub rules_evaluated: usize,
    /// Number of rules that errored.
    pub rules_errored: usize,
    /// Rules whose conditions held, including suppressed ones.
    pub rules_matched: usize,
    /// Incident keys that fired.
    pub incidents_fired: Vec<String>,
    /// Incidents withheld by suppression.
    pub incidents_suppressed: usize,
}
