//! Risk area aggregation and settlement resolution.
//!
//! The ranked fault candidates are dilated by a safety buffer and folded
//! into a single risk polygon; the municipality catalog is then queried
//! for every settlement entirely inside it. Union is commutative and
//! associative, so the fold order does not affect the result beyond
//! floating-point tolerance.

use geo::BooleanOps;
use geo::MultiPolygon;
use quakewatch_analysis_models::{FaultCandidate, RiskArea};
use quakewatch_catalog::MunicipalityCatalog;

use crate::geometry;

/// Default safety buffer applied around each fault candidate, in degrees.
pub const DEFAULT_FAULT_BUFFER: f64 = 0.3;

/// Builds the risk area for a batch of fault candidates.
///
/// Every candidate is buffered by `fault_buffer` and unioned into the risk
/// polygon, so the result is a geometric superset of each contribution.
/// Population is the integer sum over the contained municipalities. An
/// empty candidate list yields [`RiskArea::empty`].
#[must_use]
pub fn aggregate(
    candidates: &[FaultCandidate],
    fault_buffer: f64,
    municipalities: &MunicipalityCatalog,
) -> RiskArea {
    if candidates.is_empty() {
        return RiskArea::empty();
    }

    let mut geometry = MultiPolygon(Vec::new());
    for candidate in candidates {
        geometry = geometry.union(&geometry::buffer_polygon(&candidate.geometry, fault_buffer));
    }

    let matched = municipalities.contained_in(&geometry);
    let population = matched.iter().map(|m| m.population).sum();
    log::debug!(
        "Risk area covers {} municipalities, population {population}",
        matched.len()
    );

    RiskArea {
        geometry,
        municipalities: matched.into_iter().cloned().collect(),
        population,
    }
}

#[cfg(test)]
mod tests {
    use geo::{Contains, polygon};
    use quakewatch_catalog::Municipality;

    use super::*;

    fn candidate(id: &str, x: f64, y: f64) -> FaultCandidate {
        FaultCandidate {
            source_id: id.to_string(),
            geometry: polygon![
                (x: x, y: y),
                (x: x + 1.0, y: y),
                (x: x + 1.0, y: y + 1.0),
                (x: x, y: y + 1.0),
                (x: x, y: y),
            ],
            score: 1.0,
        }
    }

    fn empty_catalog() -> MunicipalityCatalog {
        MunicipalityCatalog::from_municipalities(Vec::new())
    }

    #[test]
    fn empty_candidates_yield_an_empty_area() {
        let area = aggregate(&[], DEFAULT_FAULT_BUFFER, &empty_catalog());
        assert!(area.geometry.0.is_empty());
        assert!(area.municipalities.is_empty());
        assert_eq!(area.population, 0);
    }

    #[test]
    fn risk_geometry_contains_every_contributing_candidate() {
        let candidates = vec![candidate("F1", 0.0, 0.0), candidate("F2", 30.0, 30.0)];
        let area = aggregate(&candidates, 0.1, &empty_catalog());

        // Each candidate sits strictly inside its own buffer, so the union
        // must contain it with margin to spare.
        for c in &candidates {
            assert!(
                area.geometry.contains(&c.geometry),
                "risk area does not contain candidate {}",
                c.source_id
            );
        }
    }

    #[test]
    fn aggregation_is_idempotent() {
        let candidates = vec![candidate("F1", 0.0, 0.0), candidate("F2", 0.5, 0.5)];

        let first = aggregate(&candidates, 0.2, &empty_catalog());
        let second = aggregate(&candidates, 0.2, &empty_catalog());

        assert_eq!(first.geometry, second.geometry);
        assert_eq!(first.population, second.population);
    }

    #[test]
    fn only_fully_contained_municipalities_count() {
        let inside = Municipality {
            name: "Inside".to_string(),
            province: "RI".to_string(),
            country_code: "IT".to_string(),
            population: 1000,
            geometry: MultiPolygon(vec![polygon![
                (x: 0.2, y: 0.2), (x: 0.4, y: 0.2), (x: 0.4, y: 0.4), (x: 0.2, y: 0.4), (x: 0.2, y: 0.2),
            ]]),
        };
        let partial = Municipality {
            name: "Partial".to_string(),
            province: "RI".to_string(),
            country_code: "IT".to_string(),
            population: 500,
            geometry: MultiPolygon(vec![polygon![
                (x: 1.2, y: 0.2), (x: 3.0, y: 0.2), (x: 3.0, y: 0.4), (x: 1.2, y: 0.4), (x: 1.2, y: 0.2),
            ]]),
        };
        let catalog = MunicipalityCatalog::from_municipalities(vec![inside, partial]);

        let area = aggregate(&[candidate("F1", 0.0, 0.0)], 0.3, &catalog);

        assert_eq!(area.municipalities.len(), 1);
        assert_eq!(area.municipalities[0].name, "Inside");
        assert_eq!(area.population, 1000);
    }

    #[test]
    fn centroid_is_inside_a_single_candidate_area() {
        let area = aggregate(&[candidate("F1", 0.0, 0.0)], 0.1, &empty_catalog());
        let centroid = area.centroid().unwrap();
        assert!((centroid.x() - 0.5).abs() < 0.05);
        assert!((centroid.y() - 0.5).abs() < 0.05);
    }
}
