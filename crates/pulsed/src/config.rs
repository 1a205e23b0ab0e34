//! Daemon configuration.
//!
//! Configuration for the logpulse daemon, including:
//! - Detector window and threshold tunables
//! - Pipeline scheduling intervals and queue sizing
//! - Incident and alert suppression windows
//! - Notification channel endpoints
//! - An optional rule table replacing the built-in rules

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use pulse_alerts::{
    AlertDispatcher, DispatcherConfig, PagerChannel, WebhookChannel, WebhookConfig,
};
use pulse_correlate::{default_rules, CorrelatorConfig, IncidentRule};
use pulse_detect::DetectorConfig;
use serde::{Deserialize, Serialize};

use crate::error::DaemonError;

/// Scheduling of the pipeline tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds between detector window flushes.
    pub flush_interval_secs: u64,
    /// Seconds between correlation passes.
    pub evaluation_interval_secs: u64,
    /// Capacity of the incident queue feeding the dispatch worker.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 60,
            evaluation_interval_secs: 30,
            queue_capacity: 1024,
        }
    }
}

/// Alert dispatch and channel settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AlertsConfig {
    /// Minimum seconds between two dispatches of the same alert id.
    pub alert_suppression_secs: u64,
    /// Upper bound on one dispatch across all channels, in seconds.
    pub channel_timeout_secs: u64,
    /// Chat webhook URL; chat delivery is off when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_webhook_url: Option<String>,
    /// Paging service routing key; paging is off when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pager_routing_key: Option<String>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            alert_suppression_secs: 300,
            channel_timeout_secs: 10,
            chat_webhook_url: None,
            pager_routing_key: None,
        }
    }
}

impl AlertsConfig {
    /// Builds a dispatcher with the configured channels.
    ///
    /// # Errors
    ///
    /// Returns an error if a channel endpoint is invalid.
    pub fn build_dispatcher(&self) -> Result<AlertDispatcher, DaemonError> {
        let mut dispatcher = AlertDispatcher::new(DispatcherConfig {
            alert_suppression_secs: self.alert_suppression_secs,
        });

        if let Some(url) = &self.chat_webhook_url {
            let config = WebhookConfig::new("chat", url.as_str())?;
            dispatcher = dispatcher.with_chat_channel(Arc::new(WebhookChannel::new(config)));
        }

        if let Some(key) = &self.pager_routing_key {
            dispatcher =
                dispatcher.with_pager_channel(Arc::new(PagerChannel::new("pager", key.as_str())?));
        }

        Ok(dispatcher)
    }
}

/// Main daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PulseConfig {
    /// Detector configuration.
    #[serde(default)]
    pub detector: DetectorConfig,
    /// Pipeline scheduling.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Correlation configuration.
    #[serde(default)]
    pub correlation: CorrelatorConfig,
    /// Alerting configuration.
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// Rule table; the built-in rules apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<IncidentRule>>,
}

impl PulseConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DaemonError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DaemonError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, DaemonError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DaemonError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, DaemonError> {
        toml::to_string_pretty(self)
            .map_err(|e| DaemonError::Config(format!("failed to serialize config: {e}")))
    }

    /// A starter configuration listing the built-in rules explicitly.
    #[must_use]
    pub fn sample() -> Self {
        Self {
            rules: Some(default_rules()),
            ..Self::default()
        }
    }

    /// Returns the effective rule table.
    #[must_use]
    pub fn effective_rules(&self) -> Vec<IncidentRule> {
        self.rules.clone().unwrap_or_else(default_rules)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.detector.window_size == 0 {
            return Err(DaemonError::Config(
                "detector.window_size must be greater than 0".to_string(),
            ));
        }

        if self.detector.history_size < self.detector.window_size {
            return Err(DaemonError::Config(
                "detector.history_size must be at least detector.window_size".to_string(),
            ));
        }

        if !self.detector.z_score_threshold.is_finite() || self.detector.z_score_threshold <= 0.0 {
            return Err(DaemonError::Config(
                "detector.z_score_threshold must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.flush_interval_secs == 0 {
            return Err(DaemonError::Config(
                "pipeline.flush_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.evaluation_interval_secs == 0 {
            return Err(DaemonError::Config(
                "pipeline.evaluation_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(DaemonError::Config(
                "pipeline.queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.alerts.channel_timeout_secs == 0 {
            return Err(DaemonError::Config(
                "alerts.channel_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if let Some(url) = &self.alerts.chat_webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DaemonError::Config(
                    "alerts.chat_webhook_url must start with http:// or https://".to_string(),
                ));
            }
        }

        if let Some(rules) = &self.rules {
            let mut names = HashSet::new();
            for rule in rules {
                if rule.name.trim().is_empty() {
                    return Err(DaemonError::Config(
                        "rules.name cannot be empty".to_string(),
                    ));
                }
                if rule.min_concurrency == 0 {
                    return Err(DaemonError::Config(format!(
                        "rules.min_concurrency must be at least 1 (rule '{}')",
                        rule.name
                    )));
                }
                rule.validate()
                    .map_err(|e| DaemonError::Config(format!("rules: {e}")))?;
                if !names.insert(rule.name.as_str()) {
                    return Err(DaemonError::Config(format!(
                        "rules.name '{}' is defined more than once",
                        rule.name
                    )));
                }
            }
        }

        Ok(())
    }
}
