//! Human-readable run report.

#![allow(clippy::format_push_string)]

use pulse_correlate::PredictedIncident;
use pulse_detect::AnomalyRecord;
use pulse_logs::Template;

use crate::pipeline::{PipelineStats, RunSummary};

const RULE: &str = "───────────────────────────────────────────────────────────────\n";

/// Formats a run summary for the terminal.
#[must_use]
pub fn format_report(summary: &RunSummary) -> String {
    let mut output = String::new();

    output.push_str("═══════════════════════════════════════════════════════════════\n");
    output.push_str("                      LOGPULSE RUN REPORT\n");
    output.push_str("═══════════════════════════════════════════════════════════════\n");

    output.push_str(&format_stats(&summary.stats));
    output.push('\n');
    output.push_str(&format_templates(&summary.templates));

    if summary.anomalies.is_empty() && summary.incidents.is_empty() {
        output.push_str("\nNo anomalies detected.\n");
        return output;
    }

    if !summary.anomalies.is_empty() {
        output.push_str(&format_anomalies(&summary.anomalies));
    }
    if !summary.incidents.is_empty() {
        output.push_str(&format_incidents(&summary.incidents));
    }

    output
}

fn format_stats(stats: &PipelineStats) -> String {
    let mut section = String::new();
    section.push_str(&format!("Events processed:  {}\n", stats.events_processed));
    section.push_str(&format!("Windows flushed:   {}\n", stats.windows_flushed));
    section.push_str(&format!("Anomalies:         {}\n", stats.anomalies_detected));
    section.push_str(&format!("Incidents:         {}\n", stats.incidents_predicted));
    section.push_str(&format!(
        "Alerts:            {} sent, {} suppressed\n",
        stats.alerts_dispatched, stats.alerts_suppressed
    ));
    if stats.notification_failures > 0 || stats.dispatch_errors > 0 {
        section.push_str(&format!(
            "Failures:          {} notification, {} dispatch\n",
            stats.notification_failures, stats.dispatch_errors
        ));
    }
    section
}

fn format_templates(templates: &[Template]) -> String {
    let mut section = String::new();
    section.push_str(&format!("\n📋 TEMPLATES ({})\n", templates.len()));
    section.push_str(RULE);

    for template in templates {
        section.push_str(&format!(
            "{:<5} {:>6}  {:<24} {}\n",
            template.id, template.count, template.service_name, template.template_text
        ));
    }

    section
}

fn format_anomalies(anomalies: &[AnomalyRecord]) -> String {
    let mut section = String::new();
    section.push_str(&format!("\n⚠️  ANOMALIES ({})\n", anomalies.len()));
    section.push_str(RULE);

    for anomaly in anomalies {
        section.push_str(&format!(
            "[{}] {} {}: {}\n",
            anomaly.severity, anomaly.anomaly_type, anomaly.key, anomaly.details
        ));
        if let Some(ts) = anomaly.timestamp {
            section.push_str(&format!("    at {}\n", ts.format("%Y-%m-%d %H:%M:%S UTC")));
        }
    }

    section
}

fn format_incidents(incidents: &[PredictedIncident]) -> String {
    let mut section = String::new();
    section.push_str(&format!("\n🚨 INCIDENTS ({})\n", incidents.len()));
    section.push_str(RULE);

    for incident in incidents {
        section.push_str(&format!(
            "{} {} {} (likelihood {})\n",
            incident.alert_id, incident.severity, incident.rule_name, incident.likelihood
        ));
        section.push_str(&format!("    {}\n", incident.predicted_impact));
        if !incident.affected_components.is_empty() {
            section.push_str(&format!(
                "    components: {}\n",
                incident.affected_components.join(", ")
            ));
        }
    }

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pulse_correlate::{IncidentSeverity, Likelihood};
    use pulse_detect::{AnomalyKey, AnomalySeverity, AnomalyType};
    use pulse_logs::LogLevel;

    fn template() -> Template {
        let at = Utc.with_ymd_and_hms(2025, 7, 4, 12, 0, 1).unwrap();
        Template {
            id: "P1".to_string(),
            template_text: "User <NUM> logged in from <IP_ADDR>".to_string(),
            service_name: "web-server-1".to_string(),
            count: 2,
            first_seen: at,
            last_seen: at,
        }
    }

    fn summary() -> RunSummary {
        RunSummary {
            stats: PipelineStats {
                events_processed: 5,
                windows_flushed: 1,
                ..PipelineStats::default()
            },
            templates: vec![template()],
            anomalies: Vec::new(),
            incidents: Vec::new(),
        }
    }

    #[test]
    fn quiet_run_reports_no_anomalies() {
        let report = format_report(&summary());

        assert!(report.contains("LOGPULSE RUN REPORT"));
        assert!(report.contains("Events processed:  5"));
        assert!(report.contains("TEMPLATES (1)"));
        assert!(report.contains("User <NUM> logged in from <IP_ADDR>"));
        assert!(report.contains("No anomalies detected."));
        assert!(!report.contains("Failures:"));
    }

    #[test]
    fn anomalies_and_incidents_are_listed() {
        let at = Utc.with_ymd_and_hms(2025, 7, 4, 12, 1, 0).unwrap();
        let mut summary = summary();
        summary.anomalies.push(AnomalyRecord {
            anomaly_type: AnomalyType::FrequencySpike,
            key: AnomalyKey::new("db-server-prod-03", LogLevel::Error, "P2"),
            template: None,
            current_count: 50,
            baseline_mean: 10.0,
            z_score: None,
            severity: AnomalySeverity::Medium,
            details: "Constant baseline, sudden spike to 50".to_string(),
            timestamp: Some(at),
        });
        summary.incidents.push(PredictedIncident {
            alert_id: "PRED-20250704-120100".to_string(),
            timestamp: at,
            severity: IncidentSeverity::Critical,
            likelihood: Likelihood::High,
            predicted_impact: "Pool exhaustion".to_string(),
            affected_components: vec!["db-server-prod-03".to_string()],
            root_cause: "spike".to_string(),
            contextual_data: serde_json::json!({}),
            recommended_actions: Vec::new(),
            rule_name: "DB_Connection_Exhaustion".to_string(),
        });

        let report = format_report(&summary);
        assert!(report.contains("ANOMALIES (1)"));
        assert!(report.contains("sudden spike to 50"));
        assert!(report.contains("at 2025-07-04 12:01:00 UTC"));
        assert!(report.contains("INCIDENTS (1)"));
        assert!(report.contains("PRED-20250704-120100 CRITICAL DB_Connection_Exhaustion"));
        assert!(report.contains("components: db-server-prod-03"));
        assert!(!report.contains("No anomalies detected."));
    }

    #[test]
    fn failures_are_shown_when_present() {
        let mut summary = summary();
        summary.stats.notification_failures = 2;

        let report = format_report(&summary);
        assert!(report.contains("Failures:          2 notification, 0 dispatch"));
    }
}
