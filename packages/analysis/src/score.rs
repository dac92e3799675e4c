//! Fault candidate scoring against the seismic source catalog.
//!
//! Every cluster polygon is matched against the full catalog under one of
//! two explicit policies:
//!
//! - **Vote**: a fault earns one vote per cluster whose buffered outline
//!   intersects it; scores are whole-valued vote counts.
//! - **Probability**: each cluster distributes one unit of probability
//!   over the catalog, weighted by inverse distance; a fault's score is
//!   its probability averaged across clusters.
//!
//! Ranking is score-descending; ties keep catalog insertion order.

use geo::{Distance, Euclidean, Intersects};
use quakewatch_analysis_models::{Cluster, FaultCandidate};
use quakewatch_catalog::SeismicCatalog;

use crate::geometry;

/// Minimum distance used by the probability policy, so a fault touching
/// or overlapping a cluster does not divide by zero.
pub const MIN_DISTANCE_FLOOR: f64 = 1e-6;

/// Error raised when scoring fails.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    /// An underlying geometry operation produced an unusable result.
    #[error("geometry operation failed: {message}")]
    Geometry {
        /// Description of what went wrong.
        message: String,
    },
}

/// The scoring policy in use. Chosen by explicit configuration; there is
/// no implicit default instance shared between scorer constructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringStrategy {
    /// Frequency of buffered-cluster intersection.
    Vote,
    /// Inverse-distance probability, averaged across clusters.
    Probability,
}

/// Scorer configuration.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Scoring policy.
    pub strategy: ScoringStrategy,
    /// Buffer distance applied to cluster outlines under the vote policy,
    /// in degrees.
    pub buffer_radius: f64,
    /// Maximum candidates returned; `0` returns every candidate with a
    /// positive score.
    pub max_results: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            strategy: ScoringStrategy::Vote,
            buffer_radius: 0.7,
            max_results: 3,
        }
    }
}

/// Scores the catalog against the given clusters and returns ranked fault
/// candidates.
///
/// With no clusters (or an empty catalog) the result is empty.
///
/// # Errors
///
/// Returns [`ScoreError::Geometry`] if a distance computation produces a
/// non-finite value.
pub fn score(
    clusters: &[Cluster],
    catalog: &SeismicCatalog,
    config: &ScorerConfig,
) -> Result<Vec<FaultCandidate>, ScoreError> {
    if clusters.is_empty() || catalog.is_empty() {
        return Ok(Vec::new());
    }

    let scores = match config.strategy {
        ScoringStrategy::Vote => vote_scores(clusters, catalog, config.buffer_radius),
        ScoringStrategy::Probability => probability_scores(clusters, catalog)?,
    };

    let mut candidates: Vec<FaultCandidate> = catalog
        .sources()
        .iter()
        .zip(scores)
        .filter(|(_, score)| *score > 0.0)
        .map(|(source, score)| FaultCandidate {
            source_id: source.id.clone(),
            geometry: source.geometry.clone(),
            score,
        })
        .collect();

    // Stable sort keeps catalog insertion order for equal scores.
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    if config.max_results > 0 {
        candidates.truncate(config.max_results);
    }
    Ok(candidates)
}

/// One vote per (cluster, intersected fault) pair.
fn vote_scores(clusters: &[Cluster], catalog: &SeismicCatalog, buffer_radius: f64) -> Vec<f64> {
    let mut votes = vec![0.0; catalog.len()];
    for cluster in clusters {
        let area = geometry::buffer_polygon(&cluster.hull, buffer_radius);
        for (i, fault) in catalog.sources().iter().enumerate() {
            if area.intersects(&fault.geometry) {
                votes[i] += 1.0;
            }
        }
    }
    votes
}

/// Inverse-distance weights normalized per cluster, then averaged.
///
/// Each cluster's weights form a probability distribution over the whole
/// catalog (they sum to 1) before the cross-cluster average.
fn probability_scores(
    clusters: &[Cluster],
    catalog: &SeismicCatalog,
) -> Result<Vec<f64>, ScoreError> {
    let mut totals = vec![0.0; catalog.len()];

    for cluster in clusters {
        let mut weights = Vec::with_capacity(catalog.len());
        for fault in catalog.sources() {
            let distance = Euclidean.distance(&cluster.hull, &fault.geometry);
            if !distance.is_finite() {
                return Err(ScoreError::Geometry {
                    message: format!(
                        "non-finite distance between cluster and fault {}",
                        fault.id
                    ),
                });
            }
            weights.push(distance.max(MIN_DISTANCE_FLOOR).recip());
        }

        let sum: f64 = weights.iter().sum();
        for (total, weight) in totals.iter_mut().zip(&weights) {
            *total += weight / sum;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let n = clusters.len() as f64;
    Ok(totals.into_iter().map(|total| total / n).collect())
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use quakewatch_catalog::FaultSource;

    use super::*;

    fn square(x: f64, y: f64, side: f64) -> geo::Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + side, y: y),
            (x: x + side, y: y + side),
            (x: x, y: y + side),
            (x: x, y: y),
        ]
    }

    fn catalog_of_four() -> SeismicCatalog {
        SeismicCatalog::from_sources(vec![
            FaultSource {
                id: "F1".to_string(),
                geometry: square(0.0, 0.0, 1.0),
            },
            FaultSource {
                id: "F2".to_string(),
                geometry: square(2.0, 0.0, 1.0),
            },
            FaultSource {
                id: "F3".to_string(),
                geometry: square(20.0, 0.0, 1.0),
            },
            FaultSource {
                id: "F4".to_string(),
                geometry: square(40.0, 0.0, 1.0),
            },
        ])
    }

    fn cluster_at(x: f64, y: f64) -> Cluster {
        Cluster {
            hull: square(x, y, 1.0),
            point_count: 5,
        }
    }

    #[test]
    fn vote_policy_matches_only_intersected_faults() {
        // The buffered cluster spans F1 and F2 but stays far from F3/F4.
        let clusters = vec![cluster_at(0.5, 0.0)];
        let config = ScorerConfig {
            strategy: ScoringStrategy::Vote,
            buffer_radius: 0.7,
            max_results: 0,
        };

        let candidates = score(&clusters, &catalog_of_four(), &config).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].source_id, "F1");
        assert_eq!(candidates[1].source_id, "F2");
        assert!((candidates[0].score - 1.0).abs() < f64::EPSILON);
        assert!((candidates[1].score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn vote_policy_ranks_by_count() {
        // Both clusters reach F2; only the first reaches F1.
        let clusters = vec![cluster_at(0.5, 0.0), cluster_at(2.2, 0.0)];
        let config = ScorerConfig {
            strategy: ScoringStrategy::Vote,
            buffer_radius: 0.5,
            max_results: 0,
        };

        let candidates = score(&clusters, &catalog_of_four(), &config).unwrap();

        assert_eq!(candidates[0].source_id, "F2");
        assert!((candidates[0].score - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn probability_scores_sum_to_one_per_cluster() {
        let clusters = vec![cluster_at(5.0, 5.0)];
        let config = ScorerConfig {
            strategy: ScoringStrategy::Probability,
            buffer_radius: 0.7,
            max_results: 0,
        };

        let candidates = score(&clusters, &catalog_of_four(), &config).unwrap();

        let sum: f64 = candidates.iter().map(|c| c.score).sum();
        assert!((sum - 1.0).abs() < 1e-9, "scores summed to {sum}");
    }

    #[test]
    fn probability_policy_prefers_nearer_faults() {
        let clusters = vec![cluster_at(0.5, 3.0)];
        let config = ScorerConfig {
            strategy: ScoringStrategy::Probability,
            buffer_radius: 0.7,
            max_results: 0,
        };

        let candidates = score(&clusters, &catalog_of_four(), &config).unwrap();

        assert_eq!(candidates[0].source_id, "F1");
        let scores: Vec<f64> = candidates.iter().map(|c| c.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn overlapping_fault_hits_the_distance_floor() {
        // A cluster sitting on F1 has zero distance to it; the floor keeps
        // the weight finite and F1 dominant.
        let clusters = vec![cluster_at(0.0, 0.0)];
        let config = ScorerConfig {
            strategy: ScoringStrategy::Probability,
            buffer_radius: 0.7,
            max_results: 0,
        };

        let candidates = score(&clusters, &catalog_of_four(), &config).unwrap();

        assert_eq!(candidates[0].source_id, "F1");
        assert!(candidates[0].score > 0.99);
    }

    #[test]
    fn max_results_truncates_the_ranking() {
        let clusters = vec![cluster_at(5.0, 5.0)];
        let config = ScorerConfig {
            strategy: ScoringStrategy::Probability,
            buffer_radius: 0.7,
            max_results: 2,
        };

        let candidates = score(&clusters, &catalog_of_four(), &config).unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn no_clusters_yield_no_candidates() {
        let config = ScorerConfig::default();
        let candidates = score(&[], &catalog_of_four(), &config).unwrap();
        assert!(candidates.is_empty());
    }
}
