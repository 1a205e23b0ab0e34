//! Declarative incident rules.
//!
//! A rule lists [`Trigger`]s. Each active anomaly a trigger matches counts
//! towards the rule's `min_concurrency`. Rules deserialize from TOML:
//!
//! ```toml
//! [[rules]]
//! name = "DB_Connection_Exhaustion"
//! min_concurrency = 2
//! time_window_minutes = 10
//! severity = "CRITICAL"
//! predicted_impact = "..."
//! triggers = [
//!     { pattern = { field = "service_name", service = "db-server-prod-03", contains = "ORA-00020_EXCEEDED" } },
//!     { anomaly_type = "frequency_spike" },
//! ]
//! ```

use pulse_detect::{AnomalyRecord, AnomalyType};
use serde::{Deserialize, Serialize};

use crate::error::{CorrelateError, Result};
use crate::types::IncidentSeverity;

/// Anomaly field a pattern trigger selects on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerField {
    /// The anomaly key's service name.
    #[default]
    ServiceName,
}

/// One condition contributing anomalies to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Matches the first active anomaly for `service` whose pattern id or
    /// template contains `contains`.
    Pattern {
        /// Field compared against `service`.
        #[serde(default)]
        field: TriggerField,
        /// Required service name.
        service: String,
        /// Substring looked for in the pattern id or template.
        contains: String,
    },
    /// Matches every active anomaly of this type.
    AnomalyType(AnomalyType),
}

impl Trigger {
    /// Creates a pattern trigger on the service name.
    pub fn pattern(service: impl Into<String>, contains: impl Into<String>) -> Self {
        Self::Pattern {
            field: TriggerField::ServiceName,
            service: service.into(),
            contains: contains.into(),
        }
    }

    /// Returns true if the anomaly satisfies this trigger.
    #[must_use]
    pub fn matches(&self, anomaly: &AnomalyRecord) -> bool {
        match self {
            Self::Pattern {
                field: TriggerField::ServiceName,
                service,
                contains,
            } => {
                anomaly.key.service_name == *service
                    && (anomaly.key.pattern_id.contains(contains.as_str())
                        || anomaly
                            .template
                            .as_deref()
                            .is_some_and(|t| t.contains(contains.as_str())))
            }
            Self::AnomalyType(anomaly_type) => anomaly.anomaly_type == *anomaly_type,
        }
    }
}

/// A rule correlating active anomalies into a predicted incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRule {
    /// Unique rule name.
    pub name: String,
    /// Conditions contributing matched anomalies.
    pub triggers: Vec<Trigger>,
    /// Matches required to fire.
    pub min_concurrency: usize,
    /// All timestamped matches must lie within this many minutes of now.
    pub time_window_minutes: u64,
    /// Severity of the predicted incident.
    pub severity: IncidentSeverity,
    /// Expected impact if the incident materialises.
    pub predicted_impact: String,
}

impl IncidentRule {
    /// Maximum allowed length for rule names.
    pub const MAX_NAME_LENGTH: usize = 256;

    /// Creates a new rule builder.
    pub fn builder(name: impl Into<String>) -> IncidentRuleBuilder {
        IncidentRuleBuilder::new(name)
    }

    /// Validates the rule.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CorrelateError::InvalidRule {
                reason: "rule name cannot be empty".to_string(),
            });
        }

        if self.name.len() > Self::MAX_NAME_LENGTH {
            return Err(CorrelateError::InvalidRule {
                reason: format!(
                    "rule name exceeds maximum length of {} characters",
                    Self::MAX_NAME_LENGTH
                ),
            });
        }

        if self.min_concurrency == 0 {
            return Err(CorrelateError::InvalidRule {
                reason: format!("rule '{}': min_concurrency must be at least 1", self.name),
            });
        }

        if self.triggers.is_empty() {
            return Err(CorrelateError::InvalidRule {
                reason: format!("rule '{}': at least one trigger is required", self.name),
            });
        }

        Ok(())
    }
}

/// Builder for creating [`IncidentRule`] instances.
#[derive(Debug)]
pub struct IncidentRuleBuilder {
    name: String,
    triggers: Vec<Trigger>,
    min_concurrency: usize,
    time_window_minutes: u64,
    severity: IncidentSeverity,
    predicted_impact: String,
}

impl IncidentRuleBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triggers: Vec::new(),
            min_concurrency: 1,
            time_window_minutes: 10,
            severity: IncidentSeverity::default(),
            predicted_impact: String::new(),
        }
    }

    /// Adds a trigger.
    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Adds a pattern trigger on the service name.
    #[must_use]
    pub fn pattern(self, service: impl Into<String>, contains: impl Into<String>) -> Self {
        self.trigger(Trigger::pattern(service, contains))
    }

    /// Adds an anomaly-type trigger.
    #[must_use]
    pub fn anomaly_type(self, anomaly_type: AnomalyType) -> Self {
        self.trigger(Trigger::AnomalyType(anomaly_type))
    }

    /// Sets the number of matches required to fire.
    #[must_use]
    pub const fn min_concurrency(mut self, min_concurrency: usize) -> Self {
        self.min_concurrency = min_concurrency;
        self
    }

    /// Sets the time window in minutes.
    #[must_use]
    pub const fn time_window_minutes(mut self, minutes: u64) -> Self {
        self.time_window_minutes = minutes;
        self
    }

    /// Sets the severity.
    #[must_use]
    pub const fn severity(mut self, severity: IncidentSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the predicted impact.
    #[must_use]
    pub fn predicted_impact(mut self, impact: impl Into<String>) -> Self {
        self.predicted_impact = impact.into();
        self
    }

    /// Builds and validates the [`IncidentRule`].
    pub fn build(self) -> Result<IncidentRule> {
        let rule = IncidentRule {
            name: self.name,
            triggers: self.triggers,
            min_concurrency: self.min_concurrency,
            time_window_minutes: self.time_window_minutes,
            severity: self.severity,
            predicted_impact: self.predicted_impact,
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// The built-in rule table.
#[must_use]
pub fn default_rules() -> Vec<IncidentRule> {
    vec![IncidentRule {
        name: "DB_Connection_Exhaustion".to_string(),
        triggers: vec![
            Trigger::pattern("db-server-prod-03", "ORA-00020_EXCEEDED"),
            Trigger::pattern("api-gateway-us-east-01", "connection_timeout"),
            Trigger::AnomalyType(AnomalyType::FrequencySpike),
        ],
        min_concurrency: 2,
        time_window_minutes: 10,
        severity: IncidentSeverity::Critical,
        predicted_impact: "Database connection pool exhaustion leading to API Gateway \
                           latency spikes and service unavailability for user authentication."
            .to_string(),
    }]
}
