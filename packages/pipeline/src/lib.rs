#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Three-stage concurrent detection pipeline.
//!
//! Ingest, filter, and analyze each run as a long-lived tokio task joined
//! by bounded hand-off channels:
//!
//! ```text
//! EventSource -> [raw] -> classifier filter -> [filtered] -> detector/analysis
//! ```
//!
//! A stage blocks on its empty input channel, then drains everything
//! currently queued into one micro-batch so classification and clustering
//! amortize over many events. FIFO order is preserved within each channel
//! and nothing is deduplicated. Every blocking receive also watches the
//! shutdown signal, so all three stages stop deterministically.

pub mod engine;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use quakewatch_analysis::{ClusterParams, DetectionWindow, ScorerConfig};
use quakewatch_classify::TextClassifier;
use quakewatch_event_models::Event;
use quakewatch_ingest::EventSource;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use engine::{AnalysisEngine, AnalysisError, AnalysisSummary, EngineConfig};

/// Error raised while stopping the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A stage task panicked or was cancelled.
    #[error("pipeline stage failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of each hand-off channel; a full channel applies
    /// backpressure to the producing stage.
    pub channel_capacity: usize,
    /// Number of events within the window required to call a detection.
    pub detection_threshold: usize,
    /// Width of the sliding detection window.
    pub detection_window: Duration,
    /// Clustering parameters.
    pub cluster: ClusterParams,
    /// Fault scoring policy and parameters.
    pub scorer: ScorerConfig,
    /// Safety buffer around each fault candidate, in degrees.
    pub fault_buffer: f64,
    /// Seismic source catalog dataset.
    pub seismic_catalog: PathBuf,
    /// Municipality catalog dataset.
    pub municipalities: PathBuf,
    /// Proj string of the municipality dataset's CRS, when projected.
    pub municipalities_projection: Option<String>,
    /// Directory receiving `GeoJSON` artifacts.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            detection_threshold: 5,
            detection_window: Duration::seconds(300),
            cluster: ClusterParams::default(),
            scorer: ScorerConfig::default(),
            fault_buffer: quakewatch_analysis::risk::DEFAULT_FAULT_BUFFER,
            seismic_catalog: PathBuf::from("data/catalogs/seismic_sources.geojson"),
            municipalities: PathBuf::from("data/catalogs/municipalities.geojson"),
            municipalities_projection: None,
            output_dir: PathBuf::from("data/generated"),
        }
    }
}

/// What the analyze stage observed for one micro-batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Events drained in this batch.
    pub batch_size: usize,
    /// Timestamps retained in the detection window afterwards.
    pub window_len: usize,
    /// Whether detection was active for this batch.
    pub active: bool,
    /// Analysis counts, present only when detection was active and the
    /// chain succeeded.
    pub analysis: Option<AnalysisSummary>,
}

/// Cloneable trigger for cooperative pipeline shutdown.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Signals every stage to stop at its next blocking receive.
    pub fn trigger(&self) {
        let _ = self.0.send(true);
    }
}

/// A running pipeline's stage handles and shutdown signal.
pub struct Pipeline {
    shutdown: Arc<watch::Sender<bool>>,
    ingest: JoinHandle<()>,
    filter: JoinHandle<()>,
    analyze: JoinHandle<()>,
}

impl Pipeline {
    /// Spawns the three stages and returns their handle.
    ///
    /// Batch reports stream through `reports`; dropping the receiver is
    /// harmless and only silences reporting.
    #[must_use]
    pub fn spawn(
        config: PipelineConfig,
        source: Arc<dyn EventSource>,
        classifier: Arc<dyn TextClassifier>,
        reports: mpsc::Sender<BatchReport>,
    ) -> Self {
        let capacity = config.channel_capacity.max(1);
        let (tx_raw, rx_raw) = mpsc::channel::<Event>(capacity);
        let (tx_filtered, rx_filtered) = mpsc::channel::<Event>(capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let engine = AnalysisEngine::new(EngineConfig {
            cluster: config.cluster.clone(),
            scorer: config.scorer.clone(),
            fault_buffer: config.fault_buffer,
            seismic_catalog: config.seismic_catalog.clone(),
            municipalities: config.municipalities.clone(),
            municipalities_projection: config.municipalities_projection.clone(),
            output_dir: config.output_dir.clone(),
        });
        let window = DetectionWindow::new(config.detection_threshold, config.detection_window);

        let ingest = tokio::spawn(ingest_stage(source, tx_raw, shutdown_rx.clone()));
        let filter = tokio::spawn(filter_stage(
            classifier,
            rx_raw,
            tx_filtered,
            shutdown_rx.clone(),
        ));
        let analyze = tokio::spawn(analyze_stage(
            engine,
            window,
            rx_filtered,
            reports,
            shutdown_rx,
        ));

        Self {
            shutdown: Arc::new(shutdown),
            ingest,
            filter,
            analyze,
        }
    }

    /// Returns a cloneable handle that can trigger shutdown from outside,
    /// e.g. a Ctrl-C listener.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Signals shutdown and waits for all three stages to stop.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Join`] if a stage task panicked.
    pub async fn shutdown(self) -> Result<(), PipelineError> {
        let _ = self.shutdown.send(true);
        self.join().await
    }

    /// Waits for all three stages to finish on their own, e.g. when a
    /// replay source runs out of events.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Join`] if a stage task panicked.
    pub async fn join(self) -> Result<(), PipelineError> {
        self.ingest.await?;
        self.filter.await?;
        self.analyze.await?;
        Ok(())
    }
}

/// Ingest stage: pass-through from the event source into the raw channel.
async fn ingest_stage(
    source: Arc<dyn EventSource>,
    tx: mpsc::Sender<Event>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = shutdown.changed() => log::info!("Ingest stage stopping"),
        result = source.stream(tx) => match result {
            Ok(()) => log::info!("Event source finished"),
            Err(e) => log::error!("Event source failed: {e}"),
        },
    }
}

/// Filter stage: drains a micro-batch, classifies it, and forwards the
/// relevant events individually.
async fn filter_stage(
    classifier: Arc<dyn TextClassifier>,
    mut rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let first = tokio::select! {
            _ = shutdown.changed() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let mut batch = vec![first];
        while let Ok(event) = rx.try_recv() {
            batch.push(event);
        }

        let texts: Vec<&str> = batch.iter().map(|e| e.text.as_str()).collect();
        let labels = match classifier.classify(&texts) {
            Ok(labels) => labels,
            Err(e) => {
                log::error!("Classification failed, dropping batch of {}: {e}", batch.len());
                continue;
            }
        };

        let total = batch.len();
        let mut kept = 0usize;
        for (event, label) in batch.into_iter().zip(labels) {
            if label.is_relevant() {
                kept += 1;
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        }
        log::debug!("Filtered batch: {kept}/{total} relevant");
    }
    log::info!("Filter stage stopping");
}

/// Analyze stage: feeds the detection window and, while detection is
/// active, runs the analysis chain over the accumulated event buffer.
async fn analyze_stage(
    engine: AnalysisEngine,
    mut window: DetectionWindow,
    mut rx: mpsc::Receiver<Event>,
    reports: mpsc::Sender<BatchReport>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut accumulator = EventAccumulator::new();

    loop {
        let first = tokio::select! {
            _ = shutdown.changed() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let mut batch = vec![first];
        while let Ok(event) = rx.try_recv() {
            batch.push(event);
        }
        let batch_size = batch.len();

        let timestamps: Vec<_> = batch.iter().map(|e| e.timestamp).collect();
        if let Err(e) = window.observe(&timestamps) {
            log::error!("Window maintenance failed: {e}");
        }
        accumulator.absorb(batch);

        engine.write_events_artifact(accumulator.events());

        let active = window.is_active();
        let mut report = BatchReport {
            batch_size,
            window_len: window.len(),
            active,
            analysis: None,
        };

        if active {
            match engine.analyze(accumulator.events()) {
                Ok(summary) => {
                    log::info!(
                        "Detection active: {} clusters, {} candidates, population at risk {}",
                        summary.clusters,
                        summary.candidates,
                        summary.population
                    );
                    report.analysis = Some(summary);
                }
                Err(e) => log::error!("Analysis failed for this batch: {e}"),
            }
        }
        accumulator.settle(active);

        if reports.send(report).await.is_err() {
            log::debug!("Report receiver dropped");
        }
    }
    log::info!("Analyze stage stopping");
}

/// Accumulated relevant events with edge-triggered clearing.
///
/// The buffer keeps growing while detection stays active so every analysis
/// covers the whole episode; it is cleared only on the DETECTED -> NORMAL
/// transition, which keeps an episode's events from being re-analyzed once
/// the episode ends.
struct EventAccumulator {
    buffer: Vec<Event>,
    was_active: bool,
}

impl EventAccumulator {
    const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            was_active: false,
        }
    }

    /// Appends a drained micro-batch.
    fn absorb(&mut self, batch: Vec<Event>) {
        self.buffer.extend(batch);
    }

    /// Records this batch's detection state, clearing the buffer on the
    /// falling edge.
    fn settle(&mut self, active: bool) {
        if active {
            self.was_active = true;
        } else if self.was_active {
            self.buffer.clear();
            self.was_active = false;
        }
    }

    fn events(&self) -> &[Event] {
        &self.buffer
    }
}
