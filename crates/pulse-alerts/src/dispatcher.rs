//! Alert dispatcher.
//!
//! The [`AlertDispatcher`] turns predicted incidents into notifications,
//! suppresses repeats of an alert id within a cooldown and routes by
//! severity: critical alerts page, critical/high/medium alerts go to chat.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use pulse_correlate::{IncidentSeverity, PredictedIncident};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::channels::{Notification, NotificationChannel, NotificationResult};
use crate::payload::AlertPayload;

/// Configuration for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Minimum seconds between two dispatches of the same alert id.
    pub alert_suppression_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            alert_suppression_secs: 300,
        }
    }
}

/// What happened to one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The alert id was dispatched within the cooldown; nothing was sent.
    Suppressed,
    /// The alert was dispatched; one result per channel attempted.
    Dispatched(Vec<NotificationResult>),
}

impl DispatchOutcome {
    /// Returns true if the alert was suppressed.
    #[must_use]
    pub const fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }

    /// Number of channels that accepted the alert.
    #[must_use]
    pub fn notifications_sent(&self) -> usize {
        match self {
            Self::Suppressed => 0,
            Self::Dispatched(results) => results.iter().filter(|r| r.success).count(),
        }
    }

    /// Number of channels that failed.
    #[must_use]
    pub fn notification_failures(&self) -> usize {
        match self {
            Self::Suppressed => 0,
            Self::Dispatched(results) => results.iter().filter(|r| !r.success).count(),
        }
    }
}

/// Formats, deduplicates and routes alerts.
///
/// Cloning yields a handle sharing the suppression cache.
#[derive(Debug, Clone, Default)]
pub struct AlertDispatcher {
    config: DispatcherConfig,
    /// Alert id -> last dispatch time.
    sent: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
    chat: Option<Arc<dyn NotificationChannel>>,
    pager: Option<Arc<dyn NotificationChannel>>,
}

impl AlertDispatcher {
    /// Creates a dispatcher without channels.
    #[must_use]
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the chat channel.
    #[must_use]
    pub fn with_chat_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        info!(channel = %channel.name(), "configured chat channel");
        self.chat = Some(channel);
        self
    }

    /// Sets the paging channel.
    #[must_use]
    pub fn with_pager_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        info!(channel = %channel.name(), "configured pager channel");
        self.pager = Some(channel);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Number of alert ids in the suppression cache.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.read().len()
    }

    /// Clears the suppression cache.
    pub fn reset(&self) {
        self.sent.write().clear();
    }

    /// Dispatches an alert now.
    pub fn send(&self, alert: &PredictedIncident) -> DispatchOutcome {
        self.send_at(alert, Utc::now())
    }

    /// Dispatches an alert as of `now`.
    pub fn send_at(&self, alert: &PredictedIncident, now: DateTime<Utc>) -> DispatchOutcome {
        let cooldown = i64::try_from(self.config.alert_suppression_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        {
            let mut sent = self.sent.write();
            if let Some(last) = sent.get(&alert.alert_id) {
                if now - *last < cooldown {
                    info!(alert_id = %alert.alert_id, "Suppressing duplicate alert");
                    return DispatchOutcome::Suppressed;
                }
            }
            sent.insert(alert.alert_id.clone(), now);
        }

        let payload = AlertPayload::from_incident(alert);
        match serde_json::to_string(&payload) {
            Ok(record) => info!(
                alert_id = %payload.alert_id,
                severity = %payload.severity,
                alert = %record,
                "Sending alert"
            ),
            Err(e) => warn!(alert_id = %payload.alert_id, error = %e, "failed to serialize alert"),
        }

        let mut results = Vec::new();

        if payload.severity == IncidentSeverity::Critical {
            if let Some(pager) = &self.pager {
                results.push(deliver(pager.as_ref(), &Notification::page(payload.clone())));
            }
        }

        if matches!(
            payload.severity,
            IncidentSeverity::Critical | IncidentSeverity::High | IncidentSeverity::Medium
        ) {
            if let Some(chat) = &self.chat {
                results.push(deliver(chat.as_ref(), &Notification::chat(payload)));
            }
        }

        DispatchOutcome::Dispatched(results)
    }
}

fn deliver(channel: &dyn NotificationChannel, notification: &Notification) -> NotificationResult {
    match channel.send(notification) {
        Ok(result) => {
            if !result.success {
                warn!(channel = %result.channel, message = ?result.message, "notification failed");
            }
            result
        }
        Err(e) => {
            warn!(channel = %channel.name(), error = %e, "notification error");
            NotificationResult::failure(channel.name(), e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AlertError, Result};
    use crate::payload::tests::incident;
    use parking_lot::Mutex;
    use test_case::test_case;

    /// Records every notification it receives.
    #[derive(Debug, Default)]
    struct RecordingChannel {
        received: Mutex<Vec<Notification>>,
    }

    impl RecordingChannel {
        fn count(&self) -> usize {
            self.received.lock().len()
        }
    }

    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        fn send(&self, notification: &Notification) -> Result<NotificationResult> {
            self.received.lock().push(notification.clone());
            Ok(NotificationResult::success(self.name()))
        }
    }

    #[derive(Debug)]
    struct FailingChannel;

    impl NotificationChannel for FailingChannel {
        fn name(&self) -> &str {
            "failing"
        }

        fn send(&self, _notification: &Notification) -> Result<NotificationResult> {
            Err(AlertError::NotificationFailed {
                reason: "connection refused".to_string(),
            })
        }
    }

    fn dispatcher() -> (AlertDispatcher, Arc<RecordingChannel>, Arc<RecordingChannel>) {
        let chat = Arc::new(RecordingChannel::default());
        let pager = Arc::new(RecordingChannel::default());
        let dispatcher = AlertDispatcher::new(DispatcherConfig::default())
            .with_chat_channel(chat.clone())
            .with_pager_channel(pager.clone());
        (dispatcher, chat, pager)
    }

    mod suppression_tests {
        use super::*;

        #[test]
        fn two_sends_dispatch_once() {
            let (dispatcher, chat, _) = dispatcher();
            let alert = incident(IncidentSeverity::High);
            let now = alert.timestamp;

            assert!(!dispatcher.send_at(&alert, now).is_suppressed());
            assert!(dispatcher.send_at(&alert, now + Duration::seconds(30)).is_suppressed());
            assert_eq!(chat.count(), 1);
        }

        #[test]
        fn resends_after_cooldown() {
            let (dispatcher, chat, _) = dispatcher();
            let alert = incident(IncidentSeverity::High);
            let now = alert.timestamp;

            dispatcher.send_at(&alert, now);
            dispatcher.send_at(&alert, now + Duration::seconds(300));
            assert_eq!(chat.count(), 2);
        }

        #[test]
        fn distinct_ids_are_independent() {
            let (dispatcher, chat, _) = dispatcher();
            let first = incident(IncidentSeverity::High);
            let mut second = first.clone();
            second.alert_id = "PRED-20250704-120200".to_string();

            dispatcher.send_at(&first, first.timestamp);
            dispatcher.send_at(&second, first.timestamp);
            assert_eq!(chat.count(), 2);
            assert_eq!(dispatcher.sent_count(), 2);
        }

        #[test]
        fn reset_clears_cache() {
            let (dispatcher, chat, _) = dispatcher();
            let alert = incident(IncidentSeverity::High);

            dispatcher.send_at(&alert, alert.timestamp);
            dispatcher.reset();
            dispatcher.send_at(&alert, alert.timestamp);
            assert_eq!(chat.count(), 2);
        }
    }

    mod routing_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(IncidentSeverity::Critical, 1, 1)]
        #[test_case(IncidentSeverity::High, 0, 1)]
        #[test_case(IncidentSeverity::Medium, 0, 1)]
        #[test_case(IncidentSeverity::Low, 0, 0)]
        #[test_case(IncidentSeverity::Info, 0, 0)]
        #[test_case(IncidentSeverity::Resolved, 0, 0)]
        fn routes_by_severity(severity: IncidentSeverity, pages: usize, chats: usize) {
            let (dispatcher, chat, pager) = dispatcher();
            let outcome = dispatcher.send(&incident(severity));

            assert_eq!(pager.count(), pages);
            assert_eq!(chat.count(), chats);
            assert_eq!(outcome.notifications_sent(), pages + chats);
        }

        #[test]
        fn chat_receives_formatted_message() {
            let (dispatcher, chat, _) = dispatcher();
            dispatcher.send(&incident(IncidentSeverity::Medium));

            let received = chat.received.lock();
            let Notification::Chat { message, payload } = &received[0] else {
                panic!("expected chat notification");
            };
            assert_eq!(payload.color, "#FFFF00");
            assert_eq!(
                message.header(),
                Some("🚨 MEDIUM ALERT: DB_Connection_Exhaustion")
            );
        }

        #[test]
        fn no_channels_still_records_dispatch() {
            let dispatcher = AlertDispatcher::new(DispatcherConfig::default());
            let alert = incident(IncidentSeverity::Critical);

            let outcome = dispatcher.send_at(&alert, alert.timestamp);
            assert_eq!(outcome, DispatchOutcome::Dispatched(Vec::new()));
            assert!(dispatcher.send_at(&alert, alert.timestamp).is_suppressed());
        }
    }

    #[test]
    fn channel_failure_is_counted() {
        let pager = Arc::new(RecordingChannel::default());
        let dispatcher = AlertDispatcher::new(DispatcherConfig::default())
            .with_chat_channel(Arc::new(FailingChannel))
            .with_pager_channel(pager.clone());

        let outcome = dispatcher.send(&incident(IncidentSeverity::Critical));
        assert_eq!(outcome.notifications_sent(), 1);
        assert_eq!(outcome.notification_failures(), 1);
        assert_eq!(pager.count(), 1);
    }

    #[test]
    fn suppressed_outcome_counts_nothing() {
        assert_eq!(DispatchOutcome::Suppressed.notifications_sent(), 0);
        assert_eq!(DispatchOutcome::Suppressed.notification_failures(), 0);
    }
}
