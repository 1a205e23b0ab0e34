//! Incident correlation engine.
//!
//! The [`IncidentCorrelationEngine`] keeps a registry of active anomalies and
//! a rule table. Every evaluation matches the registry against each rule and
//! emits a [`PredictedIncident`] for each rule whose conditions hold, unless
//! the same incident fired within the suppression window.
//!
//! Evaluation is level-triggered: active anomalies stay registered until they
//! are cleared, so a rule keeps firing once per suppression window for as long
//! as its conditions hold.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use pulse_detect::AnomalyRecord;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{CorrelateError, Result};
use crate::rules::{IncidentRule, Trigger};
use crate::types::{CorrelatorConfig, EvaluationResult, Likelihood, PredictedIncident};

/// Actions attached to every predicted incident.
pub const RECOMMENDED_ACTIONS: [&str; 3] = [
    "Review relevant service logs immediately.",
    "Escalate to on-call team.",
    "Check system dashboards for affected components.",
];

/// Scores a rule match.
///
/// When a model is installed, its score replaces the rule-derived likelihood.
/// Returning `None` keeps the rule-derived value.
pub trait IncidentModel: Send + Sync + fmt::Debug {
    /// Scores the anomalies matched by `rule`.
    fn score(&self, rule: &IncidentRule, matched: &[AnomalyRecord]) -> Option<Likelihood>;
}

/// Builds the registry id of an anomaly registered at `timestamp`.
#[must_use]
pub fn anomaly_id(anomaly: &AnomalyRecord, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        anomaly.anomaly_type,
        anomaly.key,
        timestamp.to_rfc3339()
    )
}

/// Correlates active anomalies into predicted incidents.
///
/// Cloning yields a handle to the same engine.
#[derive(Debug, Clone)]
pub struct IncidentCorrelationEngine {
    config: CorrelatorConfig,
    /// Fixed at construction.
    rules: Arc<[IncidentRule]>,
    /// Active anomalies in registration order.
    active: Arc<RwLock<Vec<(String, AnomalyRecord)>>>,
    /// Incident key -> last time it fired.
    last_fired: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
    model: Option<Arc<dyn IncidentModel>>,
}

impl IncidentCorrelationEngine {
    /// Creates an engine with the given rules.
    pub fn new(config: CorrelatorConfig, rules: Vec<IncidentRule>) -> Result<Self> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self {
            config,
            rules: rules.into(),
            active: Arc::new(RwLock::new(Vec::new())),
            last_fired: Arc::new(RwLock::new(HashMap::new())),
            model: None,
        })
    }

    /// Installs a scoring model.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn IncidentModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Returns the rule table.
    #[must_use]
    pub fn rules(&self) -> &[IncidentRule] {
        &self.rules
    }

    /// Registers an anomaly as active and returns its id.
    ///
    /// Registering the same anomaly twice at the same time replaces the entry
    /// in place.
    pub fn register_active(&self, anomaly: AnomalyRecord, timestamp: DateTime<Utc>) -> String {
        let id = anomaly_id(&anomaly, timestamp);
        let anomaly = anomaly.with_timestamp(timestamp);

        let mut active = self.active.write();
        if let Some(entry) = active.iter_mut().find(|(existing, _)| *existing == id) {
            entry.1 = anomaly;
        } else {
            active.push((id.clone(), anomaly));
        }

        debug!(anomaly_id = %id, active = active.len(), "registered active anomaly");
        id
    }

    /// Removes an active anomaly. Returns true if it was present.
    pub fn clear(&self, anomaly_id: &str) -> bool {
        let mut active = self.active.write();
        let before = active.len();
        active.retain(|(id, _)| id != anomaly_id);
        let removed = active.len() != before;
        if removed {
            debug!(anomaly_id = %anomaly_id, "cleared active anomaly");
        }
        removed
    }

    /// Returns the active anomalies in registration order.
    #[must_use]
    pub fn active_anomalies(&self) -> Vec<(String, AnomalyRecord)> {
        self.active.read().clone()
    }

    /// Returns the number of active anomalies.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    /// Drops active anomalies registered before `now - horizon`, and
    /// suppression entries older than the same cutoff.
    ///
    /// Returns the number of anomalies removed. Nothing calls this unless the
    /// embedding application opts in.
    pub fn evict_older_than(&self, horizon: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - horizon;

        let mut active = self.active.write();
        let before = active.len();
        active.retain(|(_, anomaly)| anomaly.timestamp.is_none_or(|ts| ts >= cutoff));
        let removed = before - active.len();

        self.last_fired.write().retain(|_, fired| *fired >= cutoff);

        if removed > 0 {
            info!(removed, remaining = active.len(), "evicted stale anomalies");
        }
        removed
    }

    /// Clears the registry and all suppression state.
    pub fn reset(&self) {
        self.active.write().clear();
        self.last_fired.write().clear();
    }

    /// Evaluates every rule at `now` and returns the incidents that fired.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Vec<PredictedIncident> {
        self.evaluate_with_result(now).0
    }

    /// Evaluates every rule at `now`, also returning pass counters.
    ///
    /// A failing rule is logged and counted; the remaining rules still run.
    pub fn evaluate_with_result(
        &self,
        now: DateTime<Utc>,
    ) -> (Vec<PredictedIncident>, EvaluationResult) {
        let anomalies: Vec<AnomalyRecord> = self
            .active
            .read()
            .iter()
            .map(|(_, anomaly)| anomaly.clone())
            .collect();

        let mut result = EvaluationResult::default();
        let mut incidents = Vec::new();

        for rule in self.rules() {
            result.rules_evaluated += 1;

            match self.evaluate_rule(rule, &anomalies, now) {
                Ok(RuleOutcome::Fired(incident_key, incident)) => {
                    result.rules_matched += 1;
                    result.incidents_fired.push(incident_key);
                    incidents.push(*incident);
                }
                Ok(RuleOutcome::Suppressed) => {
                    result.rules_matched += 1;
                    result.incidents_suppressed += 1;
                }
                Ok(RuleOutcome::NotMatched) => {}
                Err(e) => {
                    result.rules_errored += 1;
                    warn!(
                        rule_name = %rule.name,
                        error = %e,
                        "failed to evaluate incident rule"
                    );
                }
            }
        }

        debug!(
            rules_evaluated = result.rules_evaluated,
            incidents_fired = result.incidents_fired.len(),
            incidents_suppressed = result.incidents_suppressed,
            active_anomalies = anomalies.len(),
            "correlation complete"
        );

        (incidents, result)
    }

    fn evaluate_rule(
        &self,
        rule: &IncidentRule,
        anomalies: &[AnomalyRecord],
        now: DateTime<Utc>,
    ) -> Result<RuleOutcome> {
        rule.validate()?;

        let matched = collect_matches(rule, anomalies);
        if matched.len() < rule.min_concurrency {
            return Ok(RuleOutcome::NotMatched);
        }

        let window = i64::try_from(rule.time_window_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .ok_or_else(|| CorrelateError::EvaluationError {
                reason: format!(
                    "time window of {} minutes is out of range",
                    rule.time_window_minutes
                ),
            })?;

        let earliest = matched
            .iter()
            .filter_map(|anomaly| anomaly.timestamp)
            .min()
            .unwrap_or(now);
        if now - earliest > window {
            return Ok(RuleOutcome::NotMatched);
        }

        let Some(first) = matched.first() else {
            return Ok(RuleOutcome::NotMatched);
        };
        let incident_key = format!("{}-{}", rule.name, first.key);

        let suppression = i64::try_from(self.config.incident_suppression_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        {
            let mut last_fired = self.last_fired.write();
            if let Some(last) = last_fired.get(&incident_key) {
                if now - *last <= suppression {
                    debug!(incident_key = %incident_key, "suppressing incident");
                    return Ok(RuleOutcome::Suppressed);
                }
            }
            last_fired.insert(incident_key.clone(), now);
        }

        let incident = self.build_incident(rule, &matched, now)?;
        info!(
            rule_name = %rule.name,
            incident_key = %incident_key,
            alert_id = %incident.alert_id,
            severity = %incident.severity,
            matched = matched.len(),
            "predicted incident"
        );

        Ok(RuleOutcome::Fired(incident_key, Box::new(incident)))
    }

    fn build_incident(
        &self,
        rule: &IncidentRule,
        matched: &[AnomalyRecord],
        now: DateTime<Utc>,
    ) -> Result<PredictedIncident> {
        let rule_likelihood = if matched.len() >= rule.min_concurrency {
            Likelihood::High
        } else {
            Likelihood::Medium
        };
        let likelihood = self
            .model
            .as_ref()
            .and_then(|model| model.score(rule, matched))
            .unwrap_or(rule_likelihood);

        let mut affected_components: Vec<String> = Vec::new();
        for anomaly in matched {
            if !affected_components.contains(&anomaly.key.service_name) {
                affected_components.push(anomaly.key.service_name.clone());
            }
        }

        let keys: Vec<String> = matched.iter().map(|a| a.key.to_string()).collect();

        Ok(PredictedIncident {
            alert_id: now.format("PRED-%Y%m%d-%H%M%S").to_string(),
            timestamp: now,
            severity: rule.severity,
            likelihood,
            predicted_impact: rule.predicted_impact.clone(),
            affected_components,
            root_cause: format!(
                "Rule '{}' triggered by {} matched patterns/anomalies.",
                rule.name,
                matched.len()
            ),
            contextual_data: json!({ "active_anomalies_matched": serde_json::to_value(keys)? }),
            recommended_actions: RECOMMENDED_ACTIONS.iter().map(|s| (*s).to_string()).collect(),
            rule_name: rule.name.clone(),
        })
    }
}

enum RuleOutcome {
    Fired(String, Box<PredictedIncident>),
    Suppressed,
    NotMatched,
}

/// Pattern triggers contribute their first match each, then anomaly-type
/// triggers contribute every match. An anomaly hit by both is counted twice.
fn collect_matches(rule: &IncidentRule, anomalies: &[AnomalyRecord]) -> Vec<AnomalyRecord> {
    let mut matched = Vec::new();

    for trigger in &rule.triggers {
        if matches!(trigger, Trigger::Pattern { .. }) {
            if let Some(anomaly) = anomalies.iter().find(|a| trigger.matches(a)) {
                matched.push(anomaly.clone());
            }
        }
    }

    for trigger in &rule.triggers {
        if matches!(trigger, Trigger::AnomalyType(_)) {
            matched.extend(anomalies.iter().filter(|a| trigger.matches(a)).cloned());
        }
    }

    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::default_rules;
    use crate::types::IncidentSeverity;
    use chrono::TimeZone;
    use pulse_detect::{AnomalyKey, AnomalySeverity, AnomalyType};
    use pulse_logs::LogLevel;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 4, 12, 0, 0).unwrap()
    }

    fn anomaly(
        anomaly_type: AnomalyType,
        service: &str,
        pattern_id: &str,
        template: Option<&str>,
    ) -> AnomalyRecord {
        AnomalyRecord {
            anomaly_type,
            key: AnomalyKey::new(service, LogLevel::Error, pattern_id),
            template: template.map(str::to_string),
            current_count: 50,
            baseline_mean: 10.0,
            z_score: None,
            severity: AnomalySeverity::Medium,
            details: "Constant baseline, sudden spike to 50".to_string(),
            timestamp: None,
        }
    }

    fn spike(service: &str, pattern_id: &str) -> AnomalyRecord {
        anomaly(AnomalyType::FrequencySpike, service, pattern_id, None)
    }

    fn engine() -> IncidentCorrelationEngine {
        IncidentCorrelationEngine::new(CorrelatorConfig::default(), default_rules()).unwrap()
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn register_assigns_id_and_timestamp() {
            let engine = engine();
            let id = engine.register_active(spike("db", "P1"), t0());

            assert_eq!(id, "Frequency Spike-(db, ERROR, P1)-2025-07-04T12:00:00+00:00");
            let active = engine.active_anomalies();
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].0, id);
            assert_eq!(active[0].1.timestamp, Some(t0()));
        }

        #[test]
        fn re_registration_replaces_in_place() {
            let engine = engine();
            engine.register_active(spike("a", "P1"), t0());
            engine.register_active(spike("b", "P1"), t0());
            engine.register_active(spike("a", "P1"), t0());

            let services: Vec<String> = engine
                .active_anomalies()
                .into_iter()
                .map(|(_, a)| a.key.service_name)
                .collect();
            assert_eq!(services, vec!["a", "b"]);
        }

        #[test]
        fn same_anomaly_at_different_times_is_distinct() {
            let engine = engine();
            let first = engine.register_active(spike("a", "P1"), t0());
            let second = engine.register_active(spike("a", "P1"), t0() + Duration::seconds(1));

            assert_ne!(first, second);
            assert_eq!(engine.active_count(), 2);
            let timestamps: Vec<_> = engine
                .active_anomalies()
                .into_iter()
                .map(|(_, a)| a.timestamp)
                .collect();
            assert_eq!(timestamps, vec![Some(t0()), Some(t0() + Duration::seconds(1))]);
        }

        #[test]
        fn clear_removes_only_named_anomaly() {
            let engine = engine();
            let id = engine.register_active(spike("a", "P1"), t0());
            engine.register_active(spike("b", "P1"), t0());

            assert!(engine.clear(&id));
            assert!(!engine.clear(&id));
            assert_eq!(engine.active_count(), 1);
        }

        #[test]
        fn evict_older_than_horizon() {
            let engine = engine();
            engine.register_active(spike("old", "P1"), t0());
            engine.register_active(spike("new", "P1"), t0() + Duration::minutes(30));

            let removed = engine.evict_older_than(Duration::minutes(15), t0() + Duration::minutes(40));
            assert_eq!(removed, 1);
            assert_eq!(engine.active_anomalies()[0].1.key.service_name, "new");
        }

        #[test]
        fn reset_clears_registry_and_suppression() {
            let engine = engine();
            engine.register_active(spike("a", "P1"), t0());
            engine.register_active(spike("b", "P1"), t0());
            assert_eq!(engine.evaluate(t0()).len(), 1);

            engine.reset();
            assert_eq!(engine.active_count(), 0);

            engine.register_active(spike("a", "P1"), t0());
            engine.register_active(spike("b", "P1"), t0());
            assert_eq!(engine.evaluate(t0()).len(), 1);
        }
    }

    mod evaluation_tests {
        use super::*;

        #[test]
        fn two_spikes_fire_default_rule() {
            let engine = engine();
            engine.register_active(spike("db-server-prod-03", "P2"), t0());
            engine.register_active(spike("api-gateway-us-east-01", "P5"), t0());

            let now = t0() + Duration::minutes(1);
            let incidents = engine.evaluate(now);
            assert_eq!(incidents.len(), 1);

            let incident = &incidents[0];
            assert_eq!(incident.rule_name, "DB_Connection_Exhaustion");
            assert_eq!(incident.alert_id, "PRED-20250704-120100");
            assert_eq!(incident.severity, IncidentSeverity::Critical);
            assert_eq!(incident.likelihood, Likelihood::High);
            assert_eq!(
                incident.affected_components,
                vec!["db-server-prod-03", "api-gateway-us-east-01"]
            );
            assert_eq!(
                incident.root_cause,
                "Rule 'DB_Connection_Exhaustion' triggered by 2 matched patterns/anomalies."
            );
            assert_eq!(
                incident.contextual_data,
                json!({
                    "active_anomalies_matched": [
                        "(db-server-prod-03, ERROR, P2)",
                        "(api-gateway-us-east-01, ERROR, P5)"
                    ]
                })
            );
            assert_eq!(incident.recommended_actions.len(), 3);
            assert_eq!(incident.timestamp, now);
        }

        #[test]
        fn below_min_concurrency_is_quiet() {
            let engine = engine();
            engine.register_active(spike("db", "P1"), t0());

            assert!(engine.evaluate(t0()).is_empty());
        }

        #[test]
        fn single_anomaly_counted_twice() {
            let engine = engine();
            engine.register_active(
                anomaly(
                    AnomalyType::FrequencySpike,
                    "db-server-prod-03",
                    "P3",
                    Some("Listener refused: ORA-00020_EXCEEDED"),
                ),
                t0(),
            );

            let incidents = engine.evaluate(t0());
            assert_eq!(incidents.len(), 1);
            assert!(incidents[0].root_cause.contains("2 matched"));
            assert_eq!(incidents[0].affected_components, vec!["db-server-prod-03"]);
        }

        #[test]
        fn pattern_trigger_takes_first_match_only() {
            let rule = IncidentRule::builder("gateway")
                .pattern("gw", "timeout")
                .min_concurrency(2)
                .build()
                .unwrap();
            let engine =
                IncidentCorrelationEngine::new(CorrelatorConfig::default(), vec![rule]).unwrap();

            let timeout = Some("connection timeout after <NUM>ms");
            engine.register_active(anomaly(AnomalyType::HighFrequency, "gw", "P1", timeout), t0());
            engine.register_active(anomaly(AnomalyType::HighFrequency, "gw", "P2", timeout), t0());

            assert!(engine.evaluate(t0()).is_empty());
        }

        #[test]
        fn stale_matches_outside_window_are_quiet() {
            let engine = engine();
            engine.register_active(spike("a", "P1"), t0());
            engine.register_active(spike("b", "P1"), t0() + Duration::minutes(9));

            assert!(engine.evaluate(t0() + Duration::minutes(11)).is_empty());
            assert_eq!(engine.evaluate(t0() + Duration::minutes(10)).len(), 1);
        }

        #[test]
        fn missing_timestamps_use_now() {
            let engine = engine();
            {
                let mut active = engine.active.write();
                active.push(("a".to_string(), spike("a", "P1")));
                active.push(("b".to_string(), spike("b", "P1")));
            }

            assert_eq!(engine.evaluate(t0()).len(), 1);
        }

        #[test]
        fn untimestamped_matches_excluded_from_window() {
            let engine = engine();
            engine.active.write().push(("a".to_string(), spike("a", "P1")));
            engine.register_active(spike("b", "P1"), t0());

            assert_eq!(engine.evaluate(t0() + Duration::minutes(5)).len(), 1);
        }
    }

    mod suppression_tests {
        use super::*;

        fn fired_engine() -> IncidentCorrelationEngine {
            let engine = engine();
            engine.register_active(spike("a", "P1"), t0());
            engine.register_active(spike("b", "P1"), t0());
            engine
        }

        #[test]
        fn suppressed_within_window() {
            let engine = fired_engine();

            assert_eq!(engine.evaluate(t0()).len(), 1);
            let (incidents, result) = engine.evaluate_with_result(t0() + Duration::seconds(120));
            assert!(incidents.is_empty());
            assert_eq!(result.incidents_suppressed, 1);
            assert_eq!(result.rules_matched, 1);
        }

        #[test]
        fn re_fires_after_window() {
            let engine = fired_engine();

            assert_eq!(engine.evaluate(t0()).len(), 1);
            assert!(engine.evaluate(t0() + Duration::seconds(299)).is_empty());
            assert!(engine.evaluate(t0() + Duration::seconds(300)).is_empty());
            assert_eq!(engine.evaluate(t0() + Duration::seconds(301)).len(), 1);
        }

        #[test]
        fn custom_suppression_window() {
            let engine = IncidentCorrelationEngine::new(
                CorrelatorConfig {
                    incident_suppression_secs: 10,
                },
                default_rules(),
            )
            .unwrap();
            engine.register_active(spike("a", "P1"), t0());
            engine.register_active(spike("b", "P1"), t0());

            assert_eq!(engine.evaluate(t0()).len(), 1);
            assert!(engine.evaluate(t0() + Duration::seconds(10)).is_empty());
            assert_eq!(engine.evaluate(t0() + Duration::seconds(11)).len(), 1);
        }

        #[test]
        fn incident_key_uses_first_match() {
            let engine = fired_engine();
            let (_, result) = engine.evaluate_with_result(t0());
            assert_eq!(
                result.incidents_fired,
                vec!["DB_Connection_Exhaustion-(a, ERROR, P1)".to_string()]
            );
        }
    }

    mod isolation_tests {
        use super::*;

        #[test]
        fn failing_rule_does_not_abort_others() {
            let broken = IncidentRule {
                name: "broken".to_string(),
                triggers: vec![Trigger::AnomalyType(AnomalyType::FrequencySpike)],
                min_concurrency: 1,
                time_window_minutes: u64::MAX,
                severity: IncidentSeverity::High,
                predicted_impact: String::new(),
            };
            let mut rules = vec![broken];
            rules.extend(default_rules());
            let engine =
                IncidentCorrelationEngine::new(CorrelatorConfig::default(), rules).unwrap();

            engine.register_active(spike("a", "P1"), t0());
            engine.register_active(spike("b", "P1"), t0());

            let (incidents, result) = engine.evaluate_with_result(t0());
            assert_eq!(result.rules_evaluated, 2);
            assert_eq!(result.rules_errored, 1);
            assert_eq!(incidents.len(), 1);
            assert_eq!(incidents[0].rule_name, "DB_Connection_Exhaustion");
        }

        #[test]
        fn invalid_rules_rejected_at_construction() {
            let mut rule = default_rules().remove(0);
            rule.min_concurrency = 0;

            let result = IncidentCorrelationEngine::new(CorrelatorConfig::default(), vec![rule]);
            assert!(result.is_err());
        }

        #[test]
        fn rule_table_is_fixed_at_construction() {
            let engine = engine();
            let handle = engine.clone();

            assert_eq!(engine.rules().len(), 1);
            assert_eq!(handle.rules()[0].name, "DB_Connection_Exhaustion");
        }
    }

    mod model_tests {
        use super::*;

        #[derive(Debug)]
        struct Cautious;

        impl IncidentModel for Cautious {
            fn score(&self, _rule: &IncidentRule, _matched: &[AnomalyRecord]) -> Option<Likelihood> {
                Some(Likelihood::Low)
            }
        }

        #[test]
        fn model_overrides_likelihood() {
            let engine = engine().with_model(Arc::new(Cautious));
            engine.register_active(spike("a", "P1"), t0());
            engine.register_active(spike("b", "P1"), t0());

            let incidents = engine.evaluate(t0());
            assert_eq!(incidents[0].likelihood, Likelihood::Low);
        }
    }
}
