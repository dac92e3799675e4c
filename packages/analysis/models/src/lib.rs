#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Derived analysis entities shared between the analysis chain, the
//! pipeline, and the artifact exporter.
//!
//! None of these are persisted; they live for one analysis batch and are
//! written out as `GeoJSON` artifacts.

use geo::{Centroid, MultiPolygon, Point, Polygon};
use quakewatch_catalog::Municipality;

/// A spatial concentration of event reports.
///
/// The hull is the convex hull over the cluster's core points, or the
/// boundary of a small circular buffer for degenerate clusters, so it is
/// always a valid polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Concentration outline.
    pub hull: Polygon<f64>,
    /// Number of core points that formed the cluster.
    pub point_count: usize,
}

/// A seismic fault source scored as a possible origin of the detected
/// event concentration.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultCandidate {
    /// Catalog key of the matched fault source.
    pub source_id: String,
    /// Fault source outline.
    pub geometry: Polygon<f64>,
    /// Ranking score: a whole-valued vote count under the vote policy, or
    /// an averaged probability in `(0, 1]` under the probability policy.
    pub score: f64,
}

/// The terminal artifact of one detection batch: the area at risk and the
/// settlements inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskArea {
    /// Union of every buffered fault candidate.
    pub geometry: MultiPolygon<f64>,
    /// Municipalities entirely within the risk polygon, in catalog order.
    pub municipalities: Vec<Municipality>,
    /// Total resident population of the contained municipalities.
    pub population: u64,
}

impl RiskArea {
    /// An empty risk area, produced when no candidates contributed.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            geometry: MultiPolygon(Vec::new()),
            municipalities: Vec::new(),
            population: 0,
        }
    }

    /// Centroid of the risk polygon, for display.
    #[must_use]
    pub fn centroid(&self) -> Option<Point<f64>> {
        self.geometry.centroid()
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    #[test]
    fn empty_risk_area_has_no_centroid() {
        let area = RiskArea::empty();
        assert_eq!(area.population, 0);
        assert!(area.centroid().is_none());
    }

    #[test]
    fn centroid_of_unit_square() {
        let area = RiskArea {
            geometry: MultiPolygon(vec![polygon![
                (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
            ]]),
            municipalities: Vec::new(),
            population: 0,
        };
        let centroid = area.centroid().unwrap();
        assert!((centroid.x() - 0.5).abs() < 1e-12);
        assert!((centroid.y() - 0.5).abs() < 1e-12);
    }
}
