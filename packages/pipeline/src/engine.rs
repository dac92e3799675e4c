//! Per-batch analysis driver for the analyze stage.
//!
//! Runs Clusterer -> Scorer -> Aggregator over the accumulated relevant
//! events and writes the batch's artifacts. Reference catalogs reload on
//! every run: a catalog that was missing or unreadable for one batch is
//! retried on the next triggering batch instead of being cached as
//! permanently failed.

use std::path::PathBuf;

use geo::Point;
use quakewatch_analysis::{ClusterError, ClusterParams, ScoreError, ScorerConfig};
use quakewatch_catalog::{CatalogError, MunicipalityCatalog, SeismicCatalog};
use quakewatch_event_models::Event;
use quakewatch_export::Exportable;

/// Error aborting one analysis cycle. The analyze stage logs it and keeps
/// its loop running.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// A reference catalog could not be loaded for this batch.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Clustering rejected its input.
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Fault scoring failed.
    #[error(transparent)]
    Score(#[from] ScoreError),

    /// No event in the accumulated buffer carries a coordinate.
    #[error("no geotagged events to analyze")]
    NoGeotaggedEvents,
}

/// Counts summarizing one analyzed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSummary {
    /// Spatial concentrations found.
    pub clusters: usize,
    /// Fault candidates ranked.
    pub candidates: usize,
    /// Municipalities inside the risk area.
    pub municipalities: usize,
    /// Population at risk.
    pub population: u64,
}

/// Configuration for the analysis chain.
#[derive(Debug, Clone)]
pub struct EngineConfig {
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
    /// Directory receiving the batch's `GeoJSON` artifacts.
    pub output_dir: PathBuf,
}

/// Runs the full analysis chain over an accumulated event buffer.
pub struct AnalysisEngine {
    config: EngineConfig,
}

impl AnalysisEngine {
    /// Creates the engine.
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Writes the accumulated raw-events artifact.
    ///
    /// Called on every batch, detection active or not, so the events file
    /// always reflects what the analyze stage has seen.
    pub fn write_events_artifact(&self, events: &[Event]) {
        self.write_artifact("events", events);
    }

    /// Clusters, scores, and aggregates the accumulated events, writing
    /// one artifact per entity collection.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError`] when a catalog cannot be loaded, no event
    /// is geotagged, or a chain component fails. Artifact write failures
    /// are logged per collection and never abort the cycle.
    pub fn analyze(&self, events: &[Event]) -> Result<AnalysisSummary, AnalysisError> {
        let points: Vec<Point<f64>> = events.iter().filter_map(|e| e.coordinate).collect();
        if points.is_empty() {
            return Err(AnalysisError::NoGeotaggedEvents);
        }

        let seismic = SeismicCatalog::load(&self.config.seismic_catalog)?;
        let municipalities = MunicipalityCatalog::load(
            &self.config.municipalities,
            self.config.municipalities_projection.as_deref(),
        )?;

        let clusters = quakewatch_analysis::cluster::cluster(&points, &self.config.cluster)?;
        let candidates = quakewatch_analysis::score::score(&clusters, &seismic, &self.config.scorer)?;
        let area = quakewatch_analysis::risk::aggregate(
            &candidates,
            self.config.fault_buffer,
            &municipalities,
        );

        let summary = AnalysisSummary {
            clusters: clusters.len(),
            candidates: candidates.len(),
            municipalities: area.municipalities.len(),
            population: area.population,
        };

        self.write_artifact("clusters", &clusters);
        self.write_artifact("faults", &candidates);
        self.write_artifact("municipalities", &area.municipalities);
        self.write_artifact("risk_area", &[area]);

        Ok(summary)
    }

    /// Writes one artifact collection; a failure here must not block the
    /// remaining collections.
    fn write_artifact<T: Exportable>(&self, name: &str, items: &[T]) {
        if let Err(e) = quakewatch_export::write_collection(&self.config.output_dir, name, items) {
            log::error!("Failed to write {name} artifact: {e}");
        }
    }
}
