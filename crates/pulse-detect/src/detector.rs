//! Windowed frequency detector.
//!
//! Events are counted per [`AnomalyKey`] for the current window. Each
//! [`flush`](WindowedAnomalyDetector::flush) closes the window, tests every
//! key's count against the counts of its previous windows and starts a new
//! window.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use pulse_logs::NormalizedLogEvent;
use tracing::{debug, info};

use crate::error::Result;
use crate::stats::Baseline;
use crate::types::{AnomalyKey, AnomalyRecord, AnomalySeverity, AnomalyType, DetectorConfig};

#[derive(Debug, Default)]
struct WindowCount {
    count: u64,
    template: Option<String>,
}

#[derive(Debug, Default)]
struct WindowState {
    /// Keys of the current window in first-seen order.
    order: Vec<AnomalyKey>,
    counts: HashMap<AnomalyKey, WindowCount>,
    history: HashMap<AnomalyKey, VecDeque<u64>>,
}

/// Counts events per key and flags windows that deviate from their history.
///
/// Cloning yields a handle to the same detector.
#[derive(Debug, Clone)]
pub struct WindowedAnomalyDetector {
    config: DetectorConfig,
    state: Arc<Mutex<WindowState>>,
}

impl Default for WindowedAnomalyDetector {
    fn default() -> Self {
        Self {
            config: DetectorConfig::default(),
            state: Arc::new(Mutex::new(WindowState::default())),
        }
    }
}

impl WindowedAnomalyDetector {
    /// Creates a detector after validating the configuration.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Arc::new(Mutex::new(WindowState::default())),
        })
    }

    /// Returns the detector configuration.
    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Counts one event in the current window.
    pub fn update(&self, event: &NormalizedLogEvent) {
        self.record(AnomalyKey::from_event(event), event.template.as_deref(), 1);
    }

    /// Adds `count` occurrences of `key` to the current window.
    pub fn record(&self, key: AnomalyKey, template: Option<&str>, count: u64) {
        if count == 0 {
            return;
        }

        let mut state = self.state.lock();
        if !state.counts.contains_key(&key) {
            state.order.push(key.clone());
        }
        let entry = state.counts.entry(key).or_default();
        entry.count += count;
        if let Some(template) = template {
            entry.template = Some(template.to_string());
        }
    }

    /// Closes the current window and returns the anomalies found in it.
    ///
    /// Records come out in the order their keys were first seen in the window.
    /// Each count is tested against the `window_size` counts before it, so a
    /// key is first evaluated on its `window_size + 1`th flush.
    pub fn flush(&self) -> Vec<AnomalyRecord> {
        let mut state = self.state.lock();
        let order = std::mem::take(&mut state.order);
        let mut counts = std::mem::take(&mut state.counts);

        let window_size = self.config.window_size;
        let history_size = self.config.history_size;
        let threshold = self.config.z_score_threshold;

        let mut anomalies = Vec::new();
        for key in order {
            let Some(window) = counts.remove(&key) else {
                continue;
            };

            let history = state.history.entry(key.clone()).or_default();
            let skip = history.len().saturating_sub(window_size);
            let recent: Vec<u64> = history.iter().skip(skip).copied().collect();
            let anomaly = match Baseline::require(&recent, window_size) {
                Ok(baseline) => evaluate(&key, window.count, &baseline, threshold),
                Err(err) => {
                    debug!(key = %key, error = %err, "Skipping evaluation");
                    None
                }
            };

            history.push_back(window.count);
            while history.len() > history_size {
                history.pop_front();
            }

            if let Some(mut anomaly) = anomaly {
                anomaly.template = window.template;
                info!(
                    key = %anomaly.key,
                    anomaly_type = %anomaly.anomaly_type,
                    severity = %anomaly.severity,
                    count = anomaly.current_count,
                    "Anomaly detected"
                );
                anomalies.push(anomaly);
            }
        }

        anomalies
    }

    /// Returns a snapshot of the past window counts for a key, oldest first.
    #[must_use]
    pub fn history(&self, key: &AnomalyKey) -> Vec<u64> {
        self.state
            .lock()
            .history
            .get(key)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the keys counted in the current window, in first-seen order.
    #[must_use]
    pub fn pending_keys(&self) -> Vec<AnomalyKey> {
        self.state.lock().order.clone()
    }

    /// Returns the current-window count for a key.
    #[must_use]
    pub fn pending_count(&self, key: &AnomalyKey) -> u64 {
        self.state.lock().counts.get(key).map_or(0, |w| w.count)
    }

    /// Returns the number of keys with retained history.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Discards all counters and history.
    pub fn reset(&self) {
        *self.state.lock() = WindowState::default();
    }
}

/// Tests `current` against `baseline`.
///
/// A constant baseline only flags a rise above a positive mean; otherwise the
/// z-score decides.
#[must_use]
pub fn evaluate(
    key: &AnomalyKey,
    current: u64,
    baseline: &Baseline,
    threshold: f64,
) -> Option<AnomalyRecord> {
    let mean = baseline.mean();
    let value = current as f64;

    let (anomaly_type, severity, z_score, details) = match baseline.z_score(value) {
        None => {
            if !(value > mean && mean > 0.0) {
                return None;
            }
            let severity = if value > 2.0 * mean {
                AnomalySeverity::Medium
            } else {
                AnomalySeverity::Low
            };
            (
                AnomalyType::FrequencySpike,
                severity,
                None,
                format!("Constant baseline, sudden spike to {current}"),
            )
        }
        Some(z) => {
            if z.abs() <= threshold {
                return None;
            }
            let anomaly_type = if z > 0.0 {
                AnomalyType::HighFrequency
            } else {
                AnomalyType::LowFrequency
            };
            let severity = if z.abs() > 1.5 * threshold {
                AnomalySeverity::High
            } else {
                AnomalySeverity::Medium
            };
            (
                anomaly_type,
                severity,
                Some(z),
                format!("Z-score {z:.2} for {key} count {current}"),
            )
        }
    };

    Some(AnomalyRecord {
        anomaly_type,
        key: key.clone(),
        template: None,
        current_count: current,
        baseline_mean: mean,
        z_score,
        severity,
        details,
        timestamp: None,
    })
}
