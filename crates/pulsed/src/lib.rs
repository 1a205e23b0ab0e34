//! pulsed - the logpulse daemon.
//!
//! Wires the log, detection, correlation and alerting crates into a running
//! pipeline:
//!
//! - [`config`]: TOML configuration for every stage
//! - [`pipeline`]: the ingestion, flush, evaluation and dispatch tasks
//! - [`report`]: the human-readable run report
//!
//! # Example
//!
//! ```rust
//! use pulsed::{Pipeline, PulseConfig};
//!
//! let pipeline = Pipeline::new(PulseConfig::default()).unwrap();
//! pipeline.ingest_line("2025-07-04 12:00:01 [INFO] web-server-1 - User 123 logged in from 192.168.1.100");
//!
//! let anomalies = pipeline.flush_window(chrono::Utc::now());
//! assert!(anomalies.is_empty());
//! assert_eq!(pipeline.summary().templates.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;

pub use config::{AlertsConfig, PipelineConfig, PulseConfig};
pub use error::{DaemonError, Result};
pub use pipeline::{Pipeline, PipelineStats, RunSummary, ShutdownRx, ShutdownTx, RECENT_LIMIT};
pub use report::format_report;

/// The sample lines replayed by `pulsed demo`.
pub const DEMO_LINES: [&str; 5] = [
    "2025-07-04 12:00:01 [INFO] web-server-1 - User 123 logged in from 192.168.1.100",
    "2025-07-04 12:00:05 [ERROR] db-service-prod - Failed to connect to DB on port 5432. Error code 101.",
    "2025-07-04 12:00:10 [INFO] web-server-1 - User 456 logged in from 192.168.1.101",
    "2025-07-04 12:00:15 [DEBUG] message-queue-worker - Processing message <UUID> completed successfully in 15ms.",
    "2025-07-04 12:00:20 [ERROR] db-service-prod - Failed to connect to DB on port 5432. Error code 101.",
];
