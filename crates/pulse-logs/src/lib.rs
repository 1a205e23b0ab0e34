//! # pulse-logs
//!
//! Normalized log events and template recognition for logpulse.
//!
//! This crate provides:
//!
//! - [`NormalizedLogEvent`]: A parsed log record
//! - [`LogLevel`]: Severity levels
//! - [`TemplateRecognizer`]: Clusters messages into [`Template`]s with stable pattern IDs
//! - [`extract_template`]: The message normalisation used for clustering
//! - [`LineParser`]: A reference adapter for raw log lines
//!
//! ## Example
//!
//! ```rust
//! use pulse_logs::{LogLevel, NormalizedLogEvent, TemplateRecognizer};
//! use chrono::Utc;
//!
//! let recognizer = TemplateRecognizer::new();
//!
//! let event = recognizer.process_event(NormalizedLogEvent::new(
//!     Utc::now(),
//!     LogLevel::Info,
//!     "web-server-1",
//!     "User 123 logged in from 192.168.1.100",
//! ));
//!
//! assert_eq!(event.pattern_id.as_deref(), Some("P1"));
//! assert_eq!(event.template.as_deref(), Some("User <NUM> logged in from <IP_ADDR>"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod parser;
pub mod template;
pub mod types;

pub use error::{LogError, Result};
pub use parser::LineParser;
pub use template::{extract_template, Template, TemplateMatch, TemplateRecognizer};
pub use types::{LogLevel, NormalizedLogEvent, UNKNOWN_SERVICE};
