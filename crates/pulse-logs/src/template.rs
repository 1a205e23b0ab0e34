//! Template recognition for log messages.
//!
//! A template is a log message with its variable parts (addresses, numbers,
//! identifiers, host names) replaced by placeholders. Messages that reduce to the
//! same template text for the same service share one [`Template`] and one pattern
//! ID.
//!
//! Substitutions run in a fixed order: IPv4 addresses, digit runs, UUIDs, then
//! domain-like tokens. Because digit runs are replaced before the UUID pattern is
//! tried, a UUID containing any decimal digit is broken up into `<NUM>`
//! fragments and never becomes `<UUID>`. Template counts depend on this order,
//! so it must not change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::NormalizedLogEvent;

/// Placeholder for IPv4 addresses.
pub const IP_PLACEHOLDER: &str = "<IP_ADDR>";
/// Placeholder for digit runs.
pub const NUM_PLACEHOLDER: &str = "<NUM>";
/// Placeholder for UUIDs.
pub const UUID_PLACEHOLDER: &str = "<UUID>";
/// Placeholder for domain-like tokens.
pub const DOMAIN_PLACEHOLDER: &str = "<DOMAIN>";

static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap_or_else(|_| unreachable!())
});

static DIGITS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").unwrap_or_else(|_| unreachable!()));

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap_or_else(|_| unreachable!())
});

static DOMAIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9_-]+\.[a-zA-Z]{2,}").unwrap_or_else(|_| unreachable!()));

/// Reduces a message to its template text.
///
/// This is a pure function of the input text.
#[must_use]
pub fn extract_template(message: &str) -> String {
    let template = IPV4_REGEX.replace_all(message, IP_PLACEHOLDER);
    let template = DIGITS_REGEX.replace_all(&template, NUM_PLACEHOLDER);
    let template = UUID_REGEX.replace_all(&template, UUID_PLACEHOLDER);
    let template = DOMAIN_REGEX.replace_all(&template, DOMAIN_PLACEHOLDER);
    template.into_owned()
}

/// A recognised message template for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Stable pattern identifier (`P1`, `P2`, ...).
    pub id: String,
    /// The normalised message text.
    pub template_text: String,
    /// The service the template was observed on.
    pub service_name: String,
    /// Number of events matched to this template.
    pub count: u64,
    /// Timestamp of the first matching event.
    pub first_seen: DateTime<Utc>,
    /// Timestamp of the most recent matching event.
    pub last_seen: DateTime<Utc>,
}

impl Template {
    /// Returns true if this template has the given text and service.
    #[must_use]
    pub fn matches(&self, template_text: &str, service_name: &str) -> bool {
        self.template_text == template_text && self.service_name == service_name
    }
}

/// The outcome of matching one message against the template table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    /// The pattern ID assigned to the message.
    pub pattern_id: String,
    /// The template text of the message.
    pub template_text: String,
    /// True if this message created a new template.
    pub is_new: bool,
}

#[derive(Debug, Default)]
struct TemplateTable {
    /// Templates in creation order.
    templates: Vec<Template>,
    /// Last allocated pattern number.
    counter: u64,
}

/// Clusters log messages into templates.
///
/// The template table is owned by the recognizer and shared between clones.
/// Pattern IDs are allocated sequentially and never reused; templates are never
/// removed outside of [`TemplateRecognizer::reset`].
#[derive(Debug, Clone, Default)]
pub struct TemplateRecognizer {
    table: Arc<RwLock<TemplateTable>>,
}

impl TemplateRecognizer {
    /// Creates an empty recognizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches a message against the table, creating a template on a miss.
    ///
    /// Lookup is a linear scan over known templates; the first template with an
    /// equal `(template_text, service_name)` pair wins.
    pub fn observe(
        &self,
        service_name: &str,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> TemplateMatch {
        let template_text = extract_template(message);
        let mut table = self.table.write();

        if let Some(existing) = table
            .templates
            .iter_mut()
            .find(|t| t.matches(&template_text, service_name))
        {
            existing.count += 1;
            existing.last_seen = timestamp;
            return TemplateMatch {
                pattern_id: existing.id.clone(),
                template_text,
                is_new: false,
            };
        }

        table.counter += 1;
        let pattern_id = format!("P{}", table.counter);
        table.templates.push(Template {
            id: pattern_id.clone(),
            template_text: template_text.clone(),
            service_name: service_name.to_string(),
            count: 1,
            first_seen: timestamp,
            last_seen: timestamp,
        });

        debug!(
            pattern_id = %pattern_id,
            service = %service_name,
            template = %template_text,
            "new template"
        );

        TemplateMatch {
            pattern_id,
            template_text,
            is_new: true,
        }
    }

    /// Annotates an event with its pattern ID and template text.
    #[must_use]
    pub fn process_event(&self, mut event: NormalizedLogEvent) -> NormalizedLogEvent {
        let matched = self.observe(&event.service_name, &event.message, event.timestamp);
        event.pattern_id = Some(matched.pattern_id);
        event.template = Some(matched.template_text);
        event
    }

    /// Returns a snapshot of all templates in creation order.
    #[must_use]
    pub fn templates(&self) -> Vec<Template> {
        self.table.read().templates.clone()
    }

    /// Gets a template by pattern ID.
    #[must_use]
    pub fn get(&self, pattern_id: &str) -> Option<Template> {
        self.table
            .read()
            .templates
            .iter()
            .find(|t| t.id == pattern_id)
            .cloned()
    }

    /// Returns the number of known templates.
    #[must_use]
    pub fn template_count(&self) -> usize {
        self.table.read().templates.len()
    }

    /// Drops every template and restarts pattern numbering.
    ///
    /// Intended for tests and for explicit pipeline restarts.
    pub fn reset(&self) {
        let mut table = self.table.write();
        table.templates.clear();
        table.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_case::test_case;

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 4, 12, 0, second)
            .single()
            .unwrap_or_else(Utc::now)
    }

    mod extract_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(
            "User 123 logged in from 192.168.1.100",
            "User <NUM> logged in from <IP_ADDR>" ;
            "ip and number"
        )]
        #[test_case(
            "Failed to connect to DB on port 5432. Error code 101.",
            "Failed to connect to DB on port <NUM>. Error code <NUM>." ;
            "trailing period is not a domain"
        )]
        #[test_case(
            "Processing message <UUID> completed successfully in 15ms.",
            "Processing message <UUID> completed successfully in <NUM>ms." ;
            "literal placeholder is kept"
        )]
        #[test_case("Resolved host db.internal", "Resolved host <DOMAIN>" ; "domain")]
        #[test_case("no variables here", "no variables here" ; "unchanged")]
        fn extracts(message: &str, expected: &str) {
            assert_eq!(extract_template(message), expected);
        }

        #[test]
        fn digits_run_before_uuid() {
            // Any decimal digit in a UUID is consumed by the number pass first.
            let template = extract_template("job 123e4567-e89b-12d3-a456-426614174000 done");
            assert_eq!(template, "job <NUM>e<NUM>-e<NUM>b-<NUM>d<NUM>-a<NUM>-<NUM> done");
            assert!(!template.contains(UUID_PLACEHOLDER));
        }

        #[test]
        fn digit_free_uuid_is_replaced() {
            let template = extract_template("job abcdefab-cdef-abcd-efab-cdefabcdefab done");
            assert_eq!(template, "job <UUID> done");
        }

        #[test]
        fn domain_match_stops_at_first_dot_pair() {
            assert_eq!(
                extract_template("calling api.example.com now"),
                "calling <DOMAIN>.com now"
            );
        }

        proptest! {
            #[test]
            fn extraction_is_idempotent_per_message(message in ".{0,80}") {
                prop_assert_eq!(extract_template(&message), extract_template(&message));
            }

            #[test]
            fn numbers_never_split_templates(a in 0u32..100_000, b in 0u32..100_000) {
                let first = extract_template(&format!("retry {a} of {b}"));
                let second = extract_template(&format!("retry {b} of {a}"));
                prop_assert_eq!(first, second);
            }
        }
    }

    mod recognizer_tests {
        use super::*;

        #[test]
        fn assigns_sequential_ids() {
            let recognizer = TemplateRecognizer::new();

            let first = recognizer.observe("web", "hello", at(1));
            let second = recognizer.observe("web", "goodbye", at(2));

            assert_eq!(first.pattern_id, "P1");
            assert_eq!(second.pattern_id, "P2");
            assert!(first.is_new && second.is_new);
        }

        #[test]
        fn groups_messages_differing_in_numbers_and_ips() {
            let recognizer = TemplateRecognizer::new();

            let a = recognizer.process_event(NormalizedLogEvent::new(
                at(1),
                LogLevel::Info,
                "web-server-1",
                "User 123 logged in from 192.168.1.100",
            ));
            let b = recognizer.process_event(NormalizedLogEvent::new(
                at(10),
                LogLevel::Info,
                "web-server-1",
                "User 456 logged in from 192.168.1.101",
            ));

            assert_eq!(a.pattern_id, b.pattern_id);
            assert_eq!(a.template.as_deref(), Some("User <NUM> logged in from <IP_ADDR>"));

            let template = recognizer.get("P1").unwrap();
            assert_eq!(template.count, 2);
            assert_eq!(template.first_seen, at(1));
            assert_eq!(template.last_seen, at(10));
        }

        #[test]
        fn same_text_on_different_services_is_distinct() {
            let recognizer = TemplateRecognizer::new();

            let a = recognizer.observe("api", "timeout after 30s", at(1));
            let b = recognizer.observe("worker", "timeout after 45s", at(2));

            assert_ne!(a.pattern_id, b.pattern_id);
            assert_eq!(recognizer.template_count(), 2);
        }

        #[test]
        fn ids_are_never_reused() {
            let recognizer = TemplateRecognizer::new();
            recognizer.observe("svc", "a", at(1));
            recognizer.observe("svc", "b", at(2));
            recognizer.observe("svc", "a", at(3));
            let c = recognizer.observe("svc", "c", at(4));

            assert_eq!(c.pattern_id, "P3");
        }

        #[test]
        fn templates_snapshot_in_creation_order() {
            let recognizer = TemplateRecognizer::new();
            recognizer.observe("svc", "zeta", at(1));
            recognizer.observe("svc", "alpha", at(2));

            let ids: Vec<_> = recognizer.templates().into_iter().map(|t| t.id).collect();
            assert_eq!(ids, vec!["P1", "P2"]);
        }

        #[test]
        fn clones_share_the_table() {
            let recognizer = TemplateRecognizer::new();
            let clone = recognizer.clone();

            clone.observe("svc", "shared", at(1));
            assert_eq!(recognizer.template_count(), 1);
        }

        #[test]
        fn reset_restarts_numbering() {
            let recognizer = TemplateRecognizer::new();
            recognizer.observe("svc", "one", at(1));
            recognizer.reset();

            assert_eq!(recognizer.template_count(), 0);
            assert_eq!(recognizer.observe("svc", "two", at(2)).pattern_id, "P1");
        }

        #[test]
        fn get_unknown_id() {
            let recognizer = TemplateRecognizer::new();
            assert!(recognizer.get("P42").is_none());
        }
    }
}
