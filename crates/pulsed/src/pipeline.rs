//! Pipeline orchestration.
//!
//! The [`Pipeline`] owns the four stages and runs them as tokio tasks:
//! - an ingestion task parsing lines and feeding the recognizer and detector
//! - a flush task closing detector windows and registering anomalies
//! - an evaluation task running correlation and queueing incidents
//! - a dispatch worker sending each incident on a blocking thread
//!
//! Shutdown is broadcast to every task. The flush task performs a final
//! flush and the run ends with a final correlation pass, so the last partial
//! window still reaches the dispatcher.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pulse_alerts::{AlertDispatcher, DispatchOutcome};
use pulse_correlate::{IncidentCorrelationEngine, PredictedIncident};
use pulse_detect::{AnomalyRecord, WindowedAnomalyDetector};
use pulse_logs::{LineParser, NormalizedLogEvent, Template, TemplateRecognizer};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::PulseConfig;
use crate::error::{DaemonError, Result};

/// Shutdown signal receiver.
pub type ShutdownRx = broadcast::Receiver<()>;

/// Shutdown signal sender.
pub type ShutdownTx = broadcast::Sender<()>;

/// Number of recent anomalies and incidents kept for the run report.
pub const RECENT_LIMIT: usize = 256;

/// Counters shared by the pipeline tasks.
#[derive(Debug, Default)]
struct Counters {
    events_processed: AtomicU64,
    windows_flushed: AtomicU64,
    anomalies_detected: AtomicU64,
    evaluations: AtomicU64,
    incidents_predicted: AtomicU64,
    alerts_dispatched: AtomicU64,
    alerts_suppressed: AtomicU64,
    notification_failures: AtomicU64,
    dispatch_errors: AtomicU64,
}

/// A snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events run through the recognizer and detector.
    pub events_processed: u64,
    /// Detector windows closed.
    pub windows_flushed: u64,
    /// Anomalies registered with the correlation engine.
    pub anomalies_detected: u64,
    /// Correlation passes run.
    pub evaluations: u64,
    /// Incidents predicted.
    pub incidents_predicted: u64,
    /// Alerts handed to channels.
    pub alerts_dispatched: u64,
    /// Alerts withheld as duplicates.
    pub alerts_suppressed: u64,
    /// Channel deliveries that failed.
    pub notification_failures: u64,
    /// Dispatches that timed out or whose task failed.
    pub dispatch_errors: u64,
}

#[derive(Debug, Default)]
struct RecentLog {
    anomalies: VecDeque<AnomalyRecord>,
    incidents: VecDeque<PredictedIncident>,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T) {
    if queue.len() == RECENT_LIMIT {
        queue.pop_front();
    }
    queue.push_back(item);
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Counters at the end of the run.
    pub stats: PipelineStats,
    /// Templates learned, in id order.
    pub templates: Vec<Template>,
    /// Most recent anomalies.
    pub anomalies: Vec<AnomalyRecord>,
    /// Most recent predicted incidents.
    pub incidents: Vec<PredictedIncident>,
}

/// The log-to-alert pipeline.
///
/// Cloning yields a handle to the same stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PulseConfig,
    parser: LineParser,
    recognizer: TemplateRecognizer,
    detector: WindowedAnomalyDetector,
    engine: IncidentCorrelationEngine,
    dispatcher: AlertDispatcher,
    counters: Arc<Counters>,
    recent: Arc<Mutex<RecentLog>>,
    shutdown_tx: ShutdownTx,
}

impl Pipeline {
    /// Builds a pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: PulseConfig) -> Result<Self> {
        config.validate()?;

        let detector = WindowedAnomalyDetector::new(config.detector)?;
        let engine = IncidentCorrelationEngine::new(config.correlation, config.effective_rules())?;
        let dispatcher = config.alerts.build_dispatcher()?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            parser: LineParser::new(),
            recognizer: TemplateRecognizer::new(),
            detector,
            engine,
            dispatcher,
            counters: Arc::new(Counters::default()),
            recent: Arc::new(Mutex::new(RecentLog::default())),
            shutdown_tx,
        })
    }

    /// Replaces the dispatcher.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: AlertDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Returns the template recognizer.
    #[must_use]
    pub const fn recognizer(&self) -> &TemplateRecognizer {
        &self.recognizer
    }

    /// Returns the anomaly detector.
    #[must_use]
    pub const fn detector(&self) -> &WindowedAnomalyDetector {
        &self.detector
    }

    /// Returns the correlation engine.
    #[must_use]
    pub const fn engine(&self) -> &IncidentCorrelationEngine {
        &self.engine
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    /// Get a shutdown signal receiver.
    #[must_use]
    pub fn shutdown_rx(&self) -> ShutdownRx {
        self.shutdown_tx.subscribe()
    }

    /// Signal all pipeline tasks to stop.
    pub fn shutdown(&self) {
        info!("shutdown signal received");
        let _ = self.shutdown_tx.send(());
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            events_processed: c.events_processed.load(Ordering::Relaxed),
            windows_flushed: c.windows_flushed.load(Ordering::Relaxed),
            anomalies_detected: c.anomalies_detected.load(Ordering::Relaxed),
            evaluations: c.evaluations.load(Ordering::Relaxed),
            incidents_predicted: c.incidents_predicted.load(Ordering::Relaxed),
            alerts_dispatched: c.alerts_dispatched.load(Ordering::Relaxed),
            alerts_suppressed: c.alerts_suppressed.load(Ordering::Relaxed),
            notification_failures: c.notification_failures.load(Ordering::Relaxed),
            dispatch_errors: c.dispatch_errors.load(Ordering::Relaxed),
        }
    }

    /// Builds the summary of everything seen so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let recent = self.recent.lock();
        RunSummary {
            stats: self.stats(),
            templates: self.recognizer.templates(),
            anomalies: recent.anomalies.iter().cloned().collect(),
            incidents: recent.incidents.iter().cloned().collect(),
        }
    }

    /// Parses a raw line and runs it through the recognizer and detector.
    pub fn ingest_line(&self, line: &str) -> Option<NormalizedLogEvent> {
        if line.trim().is_empty() {
            return None;
        }
        Some(self.process_event(self.parser.parse(line)))
    }

    /// Annotates an event with its template and counts it in the current window.
    pub fn process_event(&self, event: NormalizedLogEvent) -> NormalizedLogEvent {
        let event = self.recognizer.process_event(event);
        self.detector.update(&event);
        self.counters.events_processed.fetch_add(1, Ordering::Relaxed);
        event
    }

    /// Closes the detector window and registers its anomalies at `now`.
    pub fn flush_window(&self, now: DateTime<Utc>) -> Vec<AnomalyRecord> {
        let anomalies = self.detector.flush();
        self.counters.windows_flushed.fetch_add(1, Ordering::Relaxed);

        let mut registered = Vec::with_capacity(anomalies.len());
        for anomaly in anomalies {
            let id = self.engine.register_active(anomaly.clone(), now);
            debug!(anomaly_id = %id, "anomaly registered");
            registered.push(anomaly.with_timestamp(now));
        }

        if !registered.is_empty() {
            self.counters
                .anomalies_detected
                .fetch_add(registered.len() as u64, Ordering::Relaxed);
            let mut recent = self.recent.lock();
            for anomaly in &registered {
                push_bounded(&mut recent.anomalies, anomaly.clone());
            }
        }

        registered
    }

    /// Runs one correlation pass at `now`.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Vec<PredictedIncident> {
        let (incidents, result) = self.engine.evaluate_with_result(now);
        self.counters.evaluations.fetch_add(1, Ordering::Relaxed);

        if result.rules_errored > 0 {
            warn!(
                rules_errored = result.rules_errored,
                rules_evaluated = result.rules_evaluated,
                "some incident rules failed"
            );
        }
        debug!(
            rules_evaluated = result.rules_evaluated,
            rules_matched = result.rules_matched,
            incidents_fired = result.incidents_fired.len(),
            incidents_suppressed = result.incidents_suppressed,
            "evaluation complete"
        );

        if !incidents.is_empty() {
            self.counters
                .incidents_predicted
                .fetch_add(incidents.len() as u64, Ordering::Relaxed);
            let mut recent = self.recent.lock();
            for incident in &incidents {
                push_bounded(&mut recent.incidents, incident.clone());
            }
        }

        incidents
    }

    /// Sends one incident through the dispatcher on the calling thread.
    pub fn dispatch(&self, incident: &PredictedIncident) -> DispatchOutcome {
        let outcome = self.dispatcher.send(incident);
        self.record_outcome(&outcome);
        outcome
    }

    fn record_outcome(&self, outcome: &DispatchOutcome) {
        let c = &self.counters;
        if outcome.is_suppressed() {
            c.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
        } else {
            c.alerts_dispatched.fetch_add(1, Ordering::Relaxed);
            c.notification_failures
                .fetch_add(outcome.notification_failures() as u64, Ordering::Relaxed);
        }
    }

    /// Sends one incident on a blocking thread, bounded by the channel timeout.
    async fn dispatch_blocking(&self, incident: PredictedIncident) {
        let limit = Duration::from_secs(self.config.alerts.channel_timeout_secs);
        let dispatcher = self.dispatcher.clone();
        let alert_id = incident.alert_id.clone();

        let task = tokio::task::spawn_blocking(move || dispatcher.send(&incident));
        match timeout(limit, task).await {
            Ok(Ok(outcome)) => self.record_outcome(&outcome),
            Ok(Err(e)) => {
                self.counters.dispatch_errors.fetch_add(1, Ordering::Relaxed);
                warn!(alert_id = %alert_id, error = %e, "dispatch task failed");
            }
            Err(_) => {
                self.counters.dispatch_errors.fetch_add(1, Ordering::Relaxed);
                warn!(alert_id = %alert_id, timeout_secs = limit.as_secs(), "dispatch timed out");
            }
        }
    }

    /// Runs the pipeline over `input` until it ends or shutdown is signalled.
    ///
    /// Ctrl-C also triggers shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if a pipeline task fails to complete.
    pub async fn run<R>(self, input: R) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        info!(
            flush_interval_secs = self.config.pipeline.flush_interval_secs,
            evaluation_interval_secs = self.config.pipeline.evaluation_interval_secs,
            rules = self.engine.rules().len(),
            "pipeline starting"
        );

        let (incident_tx, incident_rx) = mpsc::channel(self.config.pipeline.queue_capacity);

        let ingest = tokio::spawn(self.clone().ingest_task(input, self.shutdown_rx()));
        let flush = tokio::spawn(self.clone().flush_task(self.shutdown_rx()));
        let evaluate = tokio::spawn(
            self.clone()
                .evaluation_task(incident_tx.clone(), self.shutdown_rx()),
        );
        let dispatch = tokio::spawn(self.clone().dispatch_worker(incident_rx));

        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            if matches!(tokio::signal::ctrl_c().await, Ok(())) {
                info!("received SIGINT, initiating shutdown");
                let _ = shutdown_tx.send(());
            }
        });

        join("ingest", ingest).await?;
        join("flush", flush).await?;
        join("evaluation", evaluate).await?;

        // Final pass over whatever the last flush registered.
        for incident in self.evaluate(Utc::now()) {
            if incident_tx.send(incident).await.is_err() {
                warn!("dispatch queue closed, dropping incident");
            }
        }
        drop(incident_tx);
        join("dispatch", dispatch).await?;

        let summary = self.summary();
        info!(
            events = summary.stats.events_processed,
            templates = summary.templates.len(),
            anomalies = summary.stats.anomalies_detected,
            incidents = summary.stats.incidents_predicted,
            alerts = summary.stats.alerts_dispatched,
            "pipeline stopped"
        );
        Ok(summary)
    }

    async fn ingest_task<R>(self, input: R, mut shutdown_rx: ShutdownRx)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            self.ingest_line(&line);
                        }
                        Ok(None) => {
                            info!("input exhausted");
                            self.shutdown();
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to read input line");
                            self.shutdown();
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("ingest task stopping");
                    break;
                }
            }
        }
    }

    async fn flush_task(self, mut shutdown_rx: ShutdownRx) {
        let period = Duration::from_secs(self.config.pipeline.flush_interval_secs);
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_window(Utc::now());
                }
                _ = shutdown_rx.recv() => {
                    let anomalies = self.flush_window(Utc::now());
                    debug!(anomalies = anomalies.len(), "final flush complete");
                    break;
                }
            }
        }
    }

    async fn evaluation_task(
        self,
        incident_tx: mpsc::Sender<PredictedIncident>,
        mut shutdown_rx: ShutdownRx,
    ) {
        let period = Duration::from_secs(self.config.pipeline.evaluation_interval_secs);
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for incident in self.evaluate(Utc::now()) {
                        if incident_tx.send(incident).await.is_err() {
                            warn!("dispatch queue closed, dropping incident");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("evaluation task stopping");
                    break;
                }
            }
        }
    }

    async fn dispatch_worker(self, mut incident_rx: mpsc::Receiver<PredictedIncident>) {
        while let Some(incident) = incident_rx.recv().await {
            self.dispatch_blocking(incident).await;
        }
        debug!("dispatch worker stopping");
    }
}

async fn join(name: &str, handle: JoinHandle<()>) -> Result<()> {
    handle
        .await
        .map_err(|e| DaemonError::Task(format!("{name} task failed: {e}")))
}
