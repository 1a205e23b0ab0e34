//! Alert formatting and dispatch for logpulse.
//!
//! `pulse-alerts` turns predicted incidents into notifications and hands them
//! to the configured channels.
//!
//! # Features
//!
//! - **Deduplication**: An alert id is dispatched at most once per cooldown
//! - **Severity routing**: Critical alerts page; critical, high and medium alerts go to chat
//! - **Chat formatting**: Block-layout messages with a severity color
//! - **Pluggable channels**: Anything implementing [`NotificationChannel`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use pulse_alerts::{AlertDispatcher, DispatcherConfig, LogChannel};
//!
//! let dispatcher = AlertDispatcher::new(DispatcherConfig::default())
//!     .with_chat_channel(Arc::new(LogChannel::new("chat")));
//!
//! assert_eq!(dispatcher.sent_count(), 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod payload;

pub use channels::{
    LogChannel, Notification, NotificationChannel, NotificationResult, PageEvent, PagerChannel,
    WebhookChannel, WebhookConfig,
};
pub use dispatcher::{AlertDispatcher, DispatchOutcome, DispatcherConfig};
pub use error::{AlertError, Result};
pub use payload::{
    color_for_name, severity_color, AlertPayload, Attachment, Block, ChatMessage, TextKind,
    TextObject, DEFAULT_COLOR,
};
