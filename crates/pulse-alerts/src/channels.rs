//! Notification channels for alert delivery.
//!
//! This module provides the [`NotificationChannel`] trait and implementations
//! for the chat webhook and paging targets. Channels format the payload and
//! log the delivery attempt; transport clients plug in behind the same trait.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{AlertError, Result};
use crate::payload::{AlertPayload, ChatMessage};

/// A notification to be sent through a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Notification {
    /// Page the on-call responder.
    Page {
        /// The alert.
        payload: AlertPayload,
    },
    /// Post to the team chat.
    Chat {
        /// The alert.
        payload: AlertPayload,
        /// The formatted message.
        message: ChatMessage,
    },
}

impl Notification {
    /// Creates a page notification.
    #[must_use]
    pub fn page(payload: AlertPayload) -> Self {
        Self::Page { payload }
    }

    /// Creates a chat notification, formatting the message.
    #[must_use]
    pub fn chat(payload: AlertPayload) -> Self {
        let message = ChatMessage::from_payload(&payload);
        Self::Chat { payload, message }
    }

    /// Returns the alert carried by this notification.
    #[must_use]
    pub const fn payload(&self) -> &AlertPayload {
        match self {
            Self::Page { payload } | Self::Chat { payload, .. } => payload,
        }
    }

    /// Returns the target name.
    #[must_use]
    pub const fn target(&self) -> &'static str {
        match self {
            Self::Page { .. } => "page",
            Self::Chat { .. } => "chat",
        }
    }
}

/// Result of sending a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResult {
    /// Whether the notification was sent successfully.
    pub success: bool,
    /// The channel that processed this notification.
    pub channel: String,
    /// Optional message or error description.
    pub message: Option<String>,
    /// Response status code (if applicable).
    pub status_code: Option<u16>,
}

impl NotificationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            status_code: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
            status_code: None,
        }
    }

    /// Sets the status code.
    #[must_use]
    pub const fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

/// Trait for notification channels.
///
/// `send` is blocking; async callers run it on a blocking thread.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the name of this channel.
    fn name(&self) -> &str;

    /// Sends a notification through this channel.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::NotificationFailed` if the notification cannot be sent.
    fn send(&self, notification: &Notification) -> Result<NotificationResult>;

    /// Returns true if this channel is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Configuration for a chat webhook channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// The name of this webhook.
    pub name: String,
    /// The URL to post messages to.
    pub url: String,
    /// Whether this channel is enabled.
    pub enabled: bool,
}

impl WebhookConfig {
    /// Creates a new webhook configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the URL is empty or not HTTP(S).
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(AlertError::InvalidChannel {
                reason: "webhook URL cannot be empty".to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AlertError::InvalidChannel {
                reason: format!("webhook URL must be http(s): {url}"),
            });
        }

        Ok(Self {
            name: name.into(),
            url,
            enabled: true,
        })
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A chat webhook channel.
///
/// Posts the block-formatted [`ChatMessage`] as JSON to a configured URL.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    config: WebhookConfig,
}

impl WebhookChannel {
    /// Creates a new webhook channel with the given configuration.
    #[must_use]
    pub const fn new(config: WebhookConfig) -> Self {
        Self { config }
    }

    /// Returns the webhook URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Formats the notification as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::SerializationError` if serialization fails.
    pub fn format_payload(&self, notification: &Notification) -> Result<String> {
        match notification {
            Notification::Chat { message, .. } => Ok(serde_json::to_string(message)?),
            Notification::Page { payload } => {
                Ok(serde_json::to_string(&ChatMessage::from_payload(payload))?)
            }
        }
    }
}

impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        if !self.is_enabled() {
            debug!(channel = %self.name(), "channel is disabled, skipping");
            return Ok(NotificationResult::success(self.name())
                .with_message("channel disabled, notification skipped"));
        }

        let body = self.format_payload(notification)?;

        info!(
            channel = %self.name(),
            url = %self.config.url,
            alert_id = %notification.payload().alert_id,
            severity = %notification.payload().severity,
            "would send chat webhook"
        );
        debug!(body = %body, "chat webhook body");

        Ok(NotificationResult::success(self.name())
            .with_status_code(200)
            .with_message("notification queued"))
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Trigger event for a paging service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEvent {
    /// Routing key of the paging service integration.
    pub routing_key: String,
    /// Always `trigger`.
    pub event_action: String,
    /// Deduplication key, the alert id.
    pub dedup_key: String,
    /// One-line summary.
    pub summary: String,
    /// Services involved.
    pub source: String,
    /// Severity name.
    pub severity: String,
}

/// A paging channel.
#[derive(Debug, Clone)]
pub struct PagerChannel {
    name: String,
    routing_key: String,
    enabled: bool,
}

impl PagerChannel {
    /// Creates a new paging channel.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the routing key is empty.
    pub fn new(name: impl Into<String>, routing_key: impl Into<String>) -> Result<Self> {
        let routing_key = routing_key.into();
        if routing_key.trim().is_empty() {
            return Err(AlertError::InvalidChannel {
                reason: "pager routing key cannot be empty".to_string(),
            });
        }
        Ok(Self {
            name: name.into(),
            routing_key,
            enabled: true,
        })
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builds the trigger event for a notification.
    #[must_use]
    pub fn page_event(&self, notification: &Notification) -> PageEvent {
        let payload = notification.payload();
        PageEvent {
            routing_key: self.routing_key.clone(),
            event_action: "trigger".to_string(),
            dedup_key: payload.alert_id.clone(),
            summary: format!("{} ALERT: {}", payload.severity, payload.rule_name),
            source: payload.affected_components.join(", "),
            severity: payload.severity.as_str().to_lowercase(),
        }
    }
}

impl NotificationChannel for PagerChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        if !self.is_enabled() {
            debug!(channel = %self.name(), "channel is disabled, skipping");
            return Ok(NotificationResult::success(self.name())
                .with_message("channel disabled, notification skipped"));
        }

        let event = self.page_event(notification);
        let body = serde_json::to_string(&event)?;

        info!(
            channel = %self.name(),
            dedup_key = %event.dedup_key,
            summary = %event.summary,
            "would send page"
        );
        debug!(body = %body, "page body");

        Ok(NotificationResult::success(self.name())
            .with_status_code(202)
            .with_message("page queued"))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A channel that logs notifications for debugging.
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
    enabled: bool,
}

impl LogChannel {
    /// Creates a new log channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new("log")
    }
}

impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        if !self.is_enabled() {
            return Ok(NotificationResult::success(self.name()).with_message("channel disabled"));
        }

        let payload = notification.payload();
        error!(
            target_kind = notification.target(),
            alert_id = %payload.alert_id,
            rule = %payload.rule_name,
            severity = %payload.severity,
            components = ?payload.affected_components,
            "ALERT"
        );

        Ok(NotificationResult::success(self.name()).with_message("logged to tracing"))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
