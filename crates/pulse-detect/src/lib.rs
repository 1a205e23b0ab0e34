//! # pulse-detect
//!
//! Windowed frequency anomaly detection for logpulse.
//!
//! Events annotated by `pulse-logs` are counted per
//! `(service, level, pattern)` key. When the current window is flushed each
//! key's count is compared with the counts of its previous windows:
//!
//! - a perfectly constant baseline flags any rise as a **frequency spike**
//! - otherwise a z-score beyond the threshold flags **high** or **low frequency**
//!
//! ## Example
//!
//! ```rust
//! use pulse_detect::{AnomalyKey, AnomalyType, DetectorConfig, WindowedAnomalyDetector};
//! use pulse_logs::LogLevel;
//!
//! let detector = WindowedAnomalyDetector::new(
//!     DetectorConfig::default().with_window_size(5).with_history_size(100),
//! )
//! .unwrap();
//!
//! let key = AnomalyKey::new("db-service-prod", LogLevel::Error, "P2");
//! for _ in 0..5 {
//!     detector.record(key.clone(), None, 10);
//!     assert!(detector.flush().is_empty());
//! }
//!
//! detector.record(key, None, 50);
//! let anomalies = detector.flush();
//! assert_eq!(anomalies[0].anomaly_type, AnomalyType::FrequencySpike);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod detector;
pub mod error;
pub mod stats;
pub mod types;

pub use detector::{evaluate, WindowedAnomalyDetector};
pub use error::{DetectError, Result};
pub use stats::Baseline;
pub use types::{AnomalyKey, AnomalyRecord, AnomalySeverity, AnomalyType, DetectorConfig};
