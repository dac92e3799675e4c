#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CLI entry point for the detection pipeline.
//!
//! Wires an event source, the keyword classifier, and the analysis
//! configuration into the three-stage pipeline, then runs until the
//! source is exhausted or Ctrl-C triggers a cooperative shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use quakewatch_analysis::{ClusterParams, ScorerConfig, ScoringStrategy};
use quakewatch_classify::KeywordClassifier;
use quakewatch_ingest::poll::{HttpPollSource, PollConfig};
use quakewatch_ingest::replay::ReplaySource;
use quakewatch_ingest::{EventSource, SourceCredentials};
use quakewatch_pipeline::{Pipeline, PipelineConfig};
use tokio::sync::mpsc;

/// Fault scoring policy.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// Frequency of buffered-cluster intersection.
    Vote,
    /// Inverse-distance probability, averaged across clusters.
    Probability,
}

impl From<Strategy> for ScoringStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Vote => Self::Vote,
            Strategy::Probability => Self::Probability,
        }
    }
}

#[derive(Parser)]
#[command(name = "quakewatch", about = "Earthquake detection from geotagged event reports")]
struct Cli {
    /// Seismic source catalog (GeoJSON feature collection).
    #[arg(long, default_value = "data/catalogs/seismic_sources.geojson")]
    seismic_catalog: PathBuf,

    /// Municipality catalog (GeoJSON feature collection).
    #[arg(long, default_value = "data/catalogs/municipalities.geojson")]
    municipalities: PathBuf,

    /// Proj string of the municipality dataset's CRS, when projected.
    #[arg(long)]
    municipalities_projection: Option<String>,

    /// Directory receiving the generated GeoJSON artifacts.
    #[arg(long, default_value = "data/generated")]
    output_dir: PathBuf,

    /// DBSCAN neighborhood radius.
    #[arg(long, default_value_t = 0.5)]
    eps: f64,

    /// DBSCAN core-point threshold.
    #[arg(long, default_value_t = 5)]
    min_samples: usize,

    /// Skip coordinate standardization before clustering.
    #[arg(long)]
    no_standardize: bool,

    /// Fault scoring policy.
    #[arg(long, value_enum, default_value = "vote")]
    strategy: Strategy,

    /// Buffer around cluster outlines under the vote policy, in degrees.
    #[arg(long, default_value_t = 0.7)]
    cluster_buffer: f64,

    /// Maximum fault candidates returned; 0 keeps all positive scores.
    #[arg(long, default_value_t = 3)]
    max_faults: usize,

    /// Safety buffer around each fault candidate, in degrees.
    #[arg(long, default_value_t = 0.3)]
    fault_buffer: f64,

    /// Events within the window required to call a detection.
    #[arg(long, default_value_t = 5)]
    detection_threshold: usize,

    /// Detection window width, in seconds.
    #[arg(long, default_value_t = 300)]
    detection_window_secs: i64,

    /// Capacity of each hand-off channel.
    #[arg(long, default_value_t = 1024)]
    channel_capacity: usize,

    /// Replay events from an NDJSON capture instead of polling.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Delay between replayed events, in milliseconds.
    #[arg(long)]
    replay_pace_ms: Option<u64>,

    /// JSON endpoint to poll for live events.
    #[arg(long)]
    poll_url: Option<String>,

    /// Bearer token for the poll endpoint.
    #[arg(long)]
    bearer_token: Option<String>,

    /// Terms the poll endpoint should track.
    #[arg(long, default_value = "terremoto")]
    track: Vec<String>,

    /// Delay between polls, in seconds.
    #[arg(long, default_value_t = 10)]
    poll_interval_secs: u64,
}

impl Cli {
    fn source(&self) -> Result<Arc<dyn EventSource>, Box<dyn std::error::Error>> {
        if let Some(replay) = &self.replay {
            let pace = self.replay_pace_ms.map(Duration::from_millis);
            return Ok(Arc::new(ReplaySource::new(replay.clone(), pace)));
        }

        match (&self.poll_url, &self.bearer_token) {
            (Some(url), Some(token)) => {
                let source = HttpPollSource::new(
                    PollConfig {
                        endpoint: url.clone(),
                        track: self.track.clone(),
                        interval: Duration::from_secs(self.poll_interval_secs),
                    },
                    SourceCredentials {
                        bearer_token: token.clone(),
                    },
                )?;
                Ok(Arc::new(source))
            }
            _ => Err(
                "no event source configured: pass --replay FILE, or --poll-url URL with --bearer-token TOKEN"
                    .into(),
            ),
        }
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            channel_capacity: self.channel_capacity,
            detection_threshold: self.detection_threshold,
            detection_window: chrono::Duration::seconds(self.detection_window_secs),
            cluster: ClusterParams {
                eps: self.eps,
                min_samples: self.min_samples,
                standardize: !self.no_standardize,
            },
            scorer: ScorerConfig {
                strategy: self.strategy.into(),
                buffer_radius: self.cluster_buffer,
                max_results: self.max_faults,
            },
            fault_buffer: self.fault_buffer,
            seismic_catalog: self.seismic_catalog.clone(),
            municipalities: self.municipalities.clone(),
            municipalities_projection: self.municipalities_projection.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let source = cli.source()?;
    let classifier = Arc::new(KeywordClassifier::italian_earthquake()?);
    let (tx_reports, mut rx_reports) = mpsc::channel(256);

    let pipeline = Pipeline::spawn(cli.pipeline_config(), source, classifier, tx_reports);

    let reporter = tokio::spawn(async move {
        while let Some(report) = rx_reports.recv().await {
            match &report.analysis {
                Some(summary) => log::info!(
                    "Batch of {}: detection ACTIVE ({} in window), {} clusters, {} candidates, population at risk {}",
                    report.batch_size,
                    report.window_len,
                    summary.clusters,
                    summary.candidates,
                    summary.population
                ),
                None => log::info!(
                    "Batch of {}: {} in window, detection {}",
                    report.batch_size,
                    report.window_len,
                    if report.active { "active" } else { "inactive" }
                ),
            }
        }
    });

    let shutdown = pipeline.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl-C received, shutting down");
            shutdown.trigger();
        }
    });

    pipeline.join().await?;
    reporter.await?;
    Ok(())
}
