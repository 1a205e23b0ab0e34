//! Reference ingestion adapter turning raw log lines into [`NormalizedLogEvent`]s.
//!
//! Recognised formats:
//! - application lines: `2025-07-04 12:00:01 [INFO] web-server-1 - message`
//! - Java lines with millisecond timestamps: `2025-07-04 12:00:01,123 [ERROR] svc - message`
//! - access-log lines: `... [04/Jul/2025:12:00:01 +0000] "GET /path HTTP/1.1" 200 512`
//!
//! Anything else becomes an `UNKNOWN` event carrying the raw line as its message.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{LogError, Result};
use crate::types::{LogLevel, NormalizedLogEvent, UNKNOWN_SERVICE};

static SIMPLE_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[(\w+)\] (\S+) -? ?(.*)$")
        .unwrap_or_else(|_| unreachable!())
});

static JAVA_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}) \[(\w+)\] (.+?) - (.*)$")
        .unwrap_or_else(|_| unreachable!())
});

static ACCESS_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(\d{2}/\w{3}/\d{4}:\d{2}:\d{2}:\d{2} [+-]\d{4})\]? "([A-Z]+) (.+?) HTTP/\d\.\d" (\d{3}) (\d+)"#,
    )
    .unwrap_or_else(|_| unreachable!())
});

/// Service name assigned to access-log events.
pub const ACCESS_LOG_SERVICE: &str = "nginx";

/// Error classification assigned to Java out-of-memory lines.
pub const OUT_OF_MEMORY: &str = "OutOfMemoryError";

/// Parser for raw log lines.
#[derive(Debug, Clone, Default)]
pub struct LineParser;

impl LineParser {
    /// Creates a new line parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses a line, falling back to an `UNKNOWN` event when no format matches.
    ///
    /// JSON objects are decoded as [`NormalizedLogEvent`] records directly.
    #[must_use]
    pub fn parse(&self, line: &str) -> NormalizedLogEvent {
        let trimmed = line.trim();

        if trimmed.starts_with('{') {
            if let Ok(event) = NormalizedLogEvent::from_json(trimmed) {
                return event;
            }
        }

        if let Some(event) = Self::parse_access(trimmed) {
            return event;
        }

        if let Some(event) = Self::parse_java(trimmed) {
            return event;
        }

        if let Ok(event) = self.parse_simple(trimmed) {
            return event;
        }

        NormalizedLogEvent::new(Utc::now(), LogLevel::Unknown, UNKNOWN_SERVICE, trimmed)
    }

    /// Parses an application line strictly.
    ///
    /// A malformed timestamp falls back to the current time; any other mismatch
    /// is an error.
    pub fn parse_simple(&self, line: &str) -> Result<NormalizedLogEvent> {
        let caps = SIMPLE_LINE_REGEX
            .captures(line.trim())
            .ok_or_else(|| LogError::ParseError(format!("unrecognised line: {line}")))?;

        let timestamp = NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d %H:%M:%S")
            .map_or_else(|_| Utc::now(), |naive| naive.and_utc());
        let level: LogLevel = caps[2].parse().unwrap_or_default();

        Ok(NormalizedLogEvent::new(timestamp, level, &caps[3], &caps[4]))
    }

    fn parse_java(line: &str) -> Option<NormalizedLogEvent> {
        let caps = JAVA_LINE_REGEX.captures(line)?;

        let timestamp = NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d %H:%M:%S,%3f")
            .map_or_else(|_| Utc::now(), |naive| naive.and_utc());
        let level: LogLevel = caps[2].parse().unwrap_or_default();

        let event = NormalizedLogEvent::new(timestamp, level, &caps[3], &caps[4]);
        if line.contains(OUT_OF_MEMORY) {
            Some(event.with_error_type(OUT_OF_MEMORY))
        } else {
            Some(event)
        }
    }

    fn parse_access(line: &str) -> Option<NormalizedLogEvent> {
        let caps = ACCESS_LINE_REGEX.captures(line)?;

        let timestamp = DateTime::parse_from_str(&caps[1], "%d/%b/%Y:%H:%M:%S %z")
            .map_or_else(|_| Utc::now(), |ts| ts.with_timezone(&Utc));
        let method = &caps[2];
        let path = &caps[3];
        let status: u16 = caps[4].parse().ok()?;
        let bytes: u64 = caps[5].parse().unwrap_or(0);

        let level = if (200..400).contains(&status) {
            LogLevel::Info
        } else {
            LogLevel::Error
        };

        Some(
            NormalizedLogEvent::new(
                timestamp,
                level,
                ACCESS_LOG_SERVICE,
                format!("Request {path} returned {status}"),
            )
            .with_http(method, path, status, bytes),
        )
    }
}
