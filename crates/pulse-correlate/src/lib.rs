//! # pulse-correlate
//!
//! Correlates active anomalies into predicted incidents for logpulse.
//!
//! # Features
//!
//! - **Active registry**: Anomalies stay active until explicitly cleared
//! - **Declarative rules**: Pattern and anomaly-type triggers with a concurrency threshold
//! - **Time windows**: All timestamped matches must be recent
//! - **Suppression**: An incident key fires at most once per suppression window
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use pulse_correlate::{default_rules, CorrelatorConfig, IncidentCorrelationEngine};
//! use pulse_detect::{AnomalyKey, AnomalyRecord, AnomalySeverity, AnomalyType};
//! use pulse_logs::LogLevel;
//!
//! let engine = IncidentCorrelationEngine::new(CorrelatorConfig::default(), default_rules()).unwrap();
//!
//! for service in ["db-server-prod-03", "api-gateway-us-east-01"] {
//!     engine.register_active(
//!         AnomalyRecord {
//!             anomaly_type: AnomalyType::FrequencySpike,
//!             key: AnomalyKey::new(service, LogLevel::Error, "P1"),
//!             template: None,
//!             current_count: 50,
//!             baseline_mean: 10.0,
//!             z_score: None,
//!             severity: AnomalySeverity::Medium,
//!             details: "Constant baseline, sudden spike to 50".to_string(),
//!             timestamp: None,
//!         },
//!         Utc::now(),
//!     );
//! }
//!
//! let incidents = engine.evaluate(Utc::now());
//! assert_eq!(incidents[0].rule_name, "DB_Connection_Exhaustion");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod rules;
pub mod types;

pub use engine::{anomaly_id, IncidentCorrelationEngine, IncidentModel, RECOMMENDED_ACTIONS};
pub use error::{CorrelateError, Result};
pub use rules::{default_rules, IncidentRule, IncidentRuleBuilder, Trigger, TriggerField};
pub use types::{CorrelatorConfig, EvaluationResult, IncidentSeverity, Likelihood, PredictedIncident};
