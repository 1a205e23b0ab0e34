//! Alert payloads and chat message formatting.
//!
//! - [`AlertPayload`]: The flat record handed to every channel
//! - [`ChatMessage`]: A block-formatted chat message with a color attachment

use chrono::{DateTime, Utc};
use pulse_correlate::{IncidentSeverity, Likelihood, PredictedIncident};
use serde::{Deserialize, Serialize};

/// Color used for severities without a mapping.
pub const DEFAULT_COLOR: &str = "#CCCCCC";

/// Returns the attachment color for a severity name, case-insensitively.
#[must_use]
pub fn color_for_name(severity: &str) -> &'static str {
    match severity.to_uppercase().as_str() {
        "CRITICAL" => "#FF0000",
        "HIGH" => "#FFA500",
        "MEDIUM" => "#FFFF00",
        "LOW" => "#00BFFF",
        "INFO" => "#ADD8E6",
        "RESOLVED" => "#00FF00",
        _ => DEFAULT_COLOR,
    }
}

/// Returns the attachment color for a severity.
#[must_use]
pub fn severity_color(severity: IncidentSeverity) -> &'static str {
    color_for_name(severity.as_str())
}

/// The alert record handed to channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    /// Alert identifier.
    pub alert_id: String,
    /// Severity.
    pub severity: IncidentSeverity,
    /// Name of the rule that fired.
    pub rule_name: String,
    /// When the incident was predicted.
    pub timestamp: DateTime<Utc>,
    /// Confidence.
    pub likelihood: Likelihood,
    /// Services involved.
    pub affected_components: Vec<String>,
    /// Expected impact.
    pub predicted_impact: String,
    /// Root cause summary.
    pub root_cause: String,
    /// Supporting data.
    pub contextual_data: serde_json::Value,
    /// Suggested next steps.
    pub recommended_actions: Vec<String>,
    /// Attachment color for the severity.
    pub color: String,
}

impl AlertPayload {
    /// Builds the payload for a predicted incident.
    #[must_use]
    pub fn from_incident(incident: &PredictedIncident) -> Self {
        Self {
            alert_id: incident.alert_id.clone(),
            severity: incident.severity,
            rule_name: incident.rule_name.clone(),
            timestamp: incident.timestamp,
            likelihood: incident.likelihood,
            affected_components: incident.affected_components.clone(),
            predicted_impact: incident.predicted_impact.clone(),
            root_cause: incident.root_cause.clone(),
            contextual_data: incident.contextual_data.clone(),
            recommended_actions: incident.recommended_actions.clone(),
            color: severity_color(incident.severity).to_string(),
        }
    }
}

/// Text object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    /// Unformatted text.
    PlainText,
    /// Markdown-like text.
    Mrkdwn,
}

/// A text element inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextObject {
    /// Kind of text.
    #[serde(rename = "type")]
    pub kind: TextKind,
    /// The text itself.
    pub text: String,
}

impl TextObject {
    /// Plain text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::PlainText,
            text: text.into(),
        }
    }

    /// Markdown text.
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Mrkdwn,
            text: text.into(),
        }
    }
}

/// A layout block of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Large header line.
    Header {
        /// Header text.
        text: TextObject,
    },
    /// Body section with either text or a grid of fields.
    Section {
        /// Section text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        /// Field grid.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
    /// Horizontal rule.
    Divider,
}

impl Block {
    fn section(text: String) -> Self {
        Self::Section {
            text: Some(TextObject::mrkdwn(text)),
            fields: Vec::new(),
        }
    }
}

/// Colored side bar of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Hex color.
    pub color: String,
}

/// A chat message ready for a chat webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Layout blocks.
    pub blocks: Vec<Block>,
    /// Attachments carrying the severity color.
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    /// Formats an alert as a chat message.
    ///
    /// Contextual data that cannot be pretty-printed is rendered as `{}`.
    #[must_use]
    pub fn from_payload(payload: &AlertPayload) -> Self {
        let header = format!("🚨 {} ALERT: {}", payload.severity, payload.rule_name);

        let components = if payload.affected_components.is_empty() {
            "N/A".to_string()
        } else {
            payload.affected_components.join(", ")
        };
        let fields = vec![
            TextObject::mrkdwn(format!("*Alert ID:*\n`{}`", payload.alert_id)),
            TextObject::mrkdwn(format!(
                "*Timestamp:*\n{}",
                payload.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            TextObject::mrkdwn(format!("*Likelihood:*\n{}", payload.likelihood)),
            TextObject::mrkdwn(format!("*Components Affected:*\n`{components}`")),
        ];

        let context = serde_json::to_string_pretty(&payload.contextual_data)
            .unwrap_or_else(|_| "{}".to_string());

        let actions = if payload.recommended_actions.is_empty() {
            "• No specific actions provided.".to_string()
        } else {
            payload
                .recommended_actions
                .iter()
                .map(|action| format!("• {action}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let blocks = vec![
            Block::Header {
                text: TextObject::plain(header),
            },
            Block::Section {
                text: None,
                fields,
            },
            Block::section(format!("*Predicted Impact:*\n{}", payload.predicted_impact)),
            Block::section(format!(
                "*Root Cause Analysis (Predicted):*\n{}",
                payload.root_cause
            )),
            Block::section(format!("*Contextual Data:*\n```json\n{context}\n```")),
            Block::section(format!("*Recommended Actions:*\n{actions}")),
            Block::Divider,
        ];

        Self {
            blocks,
            attachments: vec![Attachment {
                color: payload.color.clone(),
            }],
        }
    }

    /// Returns the header text.
    #[must_use]
    pub fn header(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Header { text } => Some(text.text.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use test_case::test_case;

    pub(crate) fn incident(severity: IncidentSeverity) -> PredictedIncident {
        PredictedIncident {
            alert_id: "PRED-20250704-120100".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 7, 4, 12, 1, 0).unwrap(),
            severity,
            likelihood: Likelihood::High,
            predicted_impact: "Database connection pool exhaustion".to_string(),
            affected_components: vec![
                "db-server-prod-03".to_string(),
                "api-gateway-us-east-01".to_string(),
            ],
            root_cause: "Rule 'DB_Connection_Exhaustion' triggered by 2 matched patterns/anomalies."
                .to_string(),
            contextual_data: json!({ "active_anomalies_matched": ["(db, ERROR, P2)"] }),
            recommended_actions: vec![
                "Review relevant service logs immediately.".to_string(),
                "Escalate to on-call team.".to_string(),
            ],
            rule_name: "DB_Connection_Exhaustion".to_string(),
        }
    }

    #[test_case(IncidentSeverity::Critical, "#FF0000")]
    #[test_case(IncidentSeverity::High, "#FFA500")]
    #[test_case(IncidentSeverity::Medium, "#FFFF00")]
    #[test_case(IncidentSeverity::Low, "#00BFFF")]
    #[test_case(IncidentSeverity::Info, "#ADD8E6")]
    #[test_case(IncidentSeverity::Resolved, "#00FF00")]
    fn colors(severity: IncidentSeverity, expected: &str) {
        assert_eq!(severity_color(severity), expected);
    }

    #[test]
    fn unknown_severity_name_uses_default_color() {
        assert_eq!(color_for_name("catastrophic"), DEFAULT_COLOR);
        assert_eq!(color_for_name("critical"), "#FF0000");
    }

    #[test]
    fn payload_from_incident() {
        let payload = AlertPayload::from_incident(&incident(IncidentSeverity::High));

        assert_eq!(payload.alert_id, "PRED-20250704-120100");
        assert_eq!(payload.color, "#FFA500");
        assert_eq!(payload.affected_components.len(), 2);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["severity"], "HIGH");
        assert_eq!(value["likelihood"], "High");
    }

    mod chat_tests {
        use super::*;

        fn message() -> ChatMessage {
            ChatMessage::from_payload(&AlertPayload::from_incident(&incident(
                IncidentSeverity::Critical,
            )))
        }

        #[test]
        fn header_text() {
            assert_eq!(
                message().header(),
                Some("🚨 CRITICAL ALERT: DB_Connection_Exhaustion")
            );
        }

        #[test]
        fn block_layout() {
            let value = serde_json::to_value(message()).unwrap();
            let blocks = value["blocks"].as_array().unwrap();

            assert_eq!(blocks.len(), 7);
            assert_eq!(blocks[0]["type"], "header");
            assert_eq!(blocks[0]["text"]["type"], "plain_text");
            assert_eq!(blocks[1]["fields"].as_array().unwrap().len(), 4);
            assert_eq!(blocks[1]["fields"][0]["text"], "*Alert ID:*\n`PRED-20250704-120100`");
            assert_eq!(blocks[1]["fields"][1]["text"], "*Timestamp:*\n2025-07-04 12:01:00 UTC");
            assert_eq!(
                blocks[1]["fields"][3]["text"],
                "*Components Affected:*\n`db-server-prod-03, api-gateway-us-east-01`"
            );
            assert_eq!(blocks[6]["type"], "divider");
            assert_eq!(value["attachments"][0]["color"], "#FF0000");
        }

        #[test]
        fn contextual_data_is_pretty_json() {
            let msg = message();
            let Block::Section { text: Some(text), .. } = &msg.blocks[4] else {
                panic!("expected a text section");
            };
            assert!(text.text.starts_with("*Contextual Data:*\n```json\n{\n  \"active_anomalies_matched\""));
            assert!(text.text.ends_with("\n```"));
        }

        #[test]
        fn recommended_actions_are_bulleted() {
            let msg = message();
            let Block::Section { text: Some(text), .. } = &msg.blocks[5] else {
                panic!("expected a text section");
            };
            assert_eq!(
                text.text,
                "*Recommended Actions:*\n• Review relevant service logs immediately.\n• Escalate to on-call team."
            );
        }

        #[test]
        fn empty_components_and_actions() {
            let mut payload = AlertPayload::from_incident(&incident(IncidentSeverity::Medium));
            payload.affected_components.clear();
            payload.recommended_actions.clear();
            let msg = ChatMessage::from_payload(&payload);

            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(
                value["blocks"][1]["fields"][3]["text"],
                "*Components Affected:*\n`N/A`"
            );
            assert!(value["blocks"][5]["text"]["text"]
                .as_str()
                .unwrap()
                .ends_with("No specific actions provided."));
        }
    }
}
