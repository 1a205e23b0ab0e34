//! Core types for normalized log events.
//!
//! This module provides:
//! - [`LogLevel`]: Severity levels for log events
//! - [`NormalizedLogEvent`]: A parsed log record, optionally annotated with its template

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Service name substituted when an event does not carry one.
pub const UNKNOWN_SERVICE: &str = "UNKNOWN";

/// Log severity levels, ordered from most to least verbose.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    /// Level could not be determined.
    #[default]
    Unknown,
    /// Most verbose, detailed debugging information
    Trace,
    /// Debugging information
    Debug,
    /// General information
    Info,
    /// Warning conditions
    Warn,
    /// Error conditions
    Error,
    /// Unrecoverable conditions
    Critical,
}

impl LogLevel {
    /// Returns the canonical upper-case representation of this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Returns true if this level is at least as severe as the given level.
    #[must_use]
    pub fn is_at_least(&self, level: Self) -> bool {
        *self >= level
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = std::convert::Infallible;

    /// Parses a level name leniently; unrecognised names map to [`LogLevel::Unknown`].
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "trace" | "trc" => Self::Trace,
            "debug" | "dbg" => Self::Debug,
            "info" | "inf" => Self::Info,
            "warn" | "warning" | "wrn" => Self::Warn,
            "error" | "err" => Self::Error,
            "critical" | "crit" | "fatal" | "severe" => Self::Critical,
            _ => Self::Unknown,
        })
    }
}

impl From<String> for LogLevel {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

fn default_service() -> String {
    UNKNOWN_SERVICE.to_string()
}

/// A log record as produced by the ingestion adapter.
///
/// Only `timestamp`, `log_level`, `service_name` and `message` are used by the
/// pipeline. Every field has a safe default when deserializing so a sparse record
/// never fails the pipeline. `pattern_id` and `template` are filled in by
/// [`TemplateRecognizer::process_event`](crate::TemplateRecognizer::process_event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedLogEvent {
    /// When the event was logged.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Severity level.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Emitting service.
    #[serde(default = "default_service")]
    pub service_name: String,
    /// Message body.
    #[serde(default)]
    pub message: String,
    /// HTTP method, for access-log events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    /// Request path, for access-log events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_path: Option<String>,
    /// HTTP status code, for access-log events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Response size in bytes, for access-log events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<u64>,
    /// Error classification, for stack-trace events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Identifier of the matched template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    /// Template text of the matched template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl NormalizedLogEvent {
    /// Creates a new event with the required fields.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        log_level: LogLevel,
        service_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let service_name = service_name.into();
        Self {
            timestamp,
            log_level,
            service_name: if service_name.is_empty() {
                default_service()
            } else {
                service_name
            },
            message: message.into(),
            http_method: None,
            request_path: None,
            status_code: None,
            bytes_sent: None,
            error_type: None,
            pattern_id: None,
            template: None,
        }
    }

    /// Deserializes an event from a JSON object, defaulting missing fields.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Attaches HTTP request details.
    #[must_use]
    pub fn with_http(
        mut self,
        method: impl Into<String>,
        path: impl Into<String>,
        status_code: u16,
        bytes_sent: u64,
    ) -> Self {
        self.http_method = Some(method.into());
        self.request_path = Some(path.into());
        self.status_code = Some(status_code);
        self.bytes_sent = Some(bytes_sent);
        self
    }

    /// Attaches an error classification.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Returns true once the event has been matched to a template.
    #[must_use]
    pub const fn is_annotated(&self) -> bool {
        self.pattern_id.is_some()
    }
}
