#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `GeoJSON` artifact writing for detection batch entities.
//!
//! Every analyzed batch produces one feature collection file per entity
//! collection (events, clusters, faults, risk area, municipalities). Each
//! entity declares its output schema explicitly through [`Exportable`], so
//! schema mistakes show up at compile time instead of at write time.
//!
//! Entities without a geometry contribute no feature; an empty collection
//! still produces a file with zero features so downstream consumers can
//! always read it.

use std::path::{Path, PathBuf};

use geo::Geometry;
use quakewatch_analysis_models::{Cluster, FaultCandidate, RiskArea};
use quakewatch_catalog::Municipality;
use quakewatch_event_models::Event;

/// Error raised when an artifact file cannot be written.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// File write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feature collection serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An entity that can be written as one `GeoJSON` feature.
pub trait Exportable {
    /// The entity's geometry, if it has one.
    fn geometry(&self) -> Option<Geometry<f64>>;

    /// The entity's non-geometry attributes as ordered string fields.
    fn to_fields(&self) -> Vec<(String, String)>;
}

/// Writes one entity collection as `<dir>/<name>.geojson`.
///
/// Returns the path written.
///
/// # Errors
///
/// Returns [`ExportError`] if the directory cannot be created or the file
/// cannot be serialized or written.
pub fn write_collection<T: Exportable>(
    dir: &Path,
    name: &str,
    items: &[T],
) -> Result<PathBuf, ExportError> {
    let features: Vec<geojson::Feature> = items
        .iter()
        .filter_map(|item| {
            let geometry = item.geometry()?;
            let mut properties = serde_json::Map::new();
            for (key, value) in item.to_fields() {
                properties.insert(key, serde_json::Value::String(value));
            }
            Some(geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();

    let feature_count = features.len();
    let collection = geojson::GeoJson::FeatureCollection(geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{name}.geojson"));
    std::fs::write(&path, serde_json::to_string(&collection)?)?;

    log::debug!("Wrote {feature_count} features to {}", path.display());
    Ok(path)
}

impl Exportable for Event {
    fn geometry(&self) -> Option<Geometry<f64>> {
        self.coordinate.map(Geometry::Point)
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id.clone()),
            ("text".to_string(), self.text.clone()),
            ("author".to_string(), self.author.clone()),
            (
                "place".to_string(),
                self.place.clone().unwrap_or_default(),
            ),
            ("time_posted".to_string(), self.timestamp.to_rfc3339()),
        ]
    }
}

impl Exportable for Cluster {
    fn geometry(&self) -> Option<Geometry<f64>> {
        Some(Geometry::Polygon(self.hull.clone()))
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        vec![("point_count".to_string(), self.point_count.to_string())]
    }
}

impl Exportable for FaultCandidate {
    fn geometry(&self) -> Option<Geometry<f64>> {
        Some(Geometry::Polygon(self.geometry.clone()))
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("source_id".to_string(), self.source_id.clone()),
            ("score".to_string(), self.score.to_string()),
        ]
    }
}

impl Exportable for RiskArea {
    fn geometry(&self) -> Option<Geometry<f64>> {
        if self.geometry.0.is_empty() {
            None
        } else {
            Some(Geometry::MultiPolygon(self.geometry.clone()))
        }
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        let municipalities = self
            .municipalities
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let centroid = self.centroid().map_or_else(String::new, |c| {
            format!("POINT ({} {})", c.x(), c.y())
        });
        vec![
            ("municipalities".to_string(), format!("[{municipalities}]")),
            ("population".to_string(), self.population.to_string()),
            ("centroid".to_string(), centroid),
        ]
    }
}

impl Exportable for Municipality {
    fn geometry(&self) -> Option<Geometry<f64>> {
        Some(Geometry::MultiPolygon(self.geometry.clone()))
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("name".to_string(), self.name.clone()),
            ("province".to_string(), self.province.clone()),
            ("country_code".to_string(), self.country_code.clone()),
            ("population".to_string(), self.population.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use geo::polygon;

    use super::*;

    fn out_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("quakewatch-export-{name}"))
    }

    fn read_features(path: &Path) -> Vec<geojson::Feature> {
        let text = std::fs::read_to_string(path).unwrap();
        match text.parse::<geojson::GeoJson>().unwrap() {
            geojson::GeoJson::FeatureCollection(fc) => fc.features,
            other => panic!("expected a feature collection, got {other:?}"),
        }
    }

    fn event(id: &str) -> Event {
        Event::new(
            id,
            "scossa",
            "anna",
            Utc.with_ymd_and_hms(2024, 8, 24, 3, 36, 0).unwrap(),
        )
    }

    #[test]
    fn empty_collection_still_writes_a_file() {
        let dir = out_dir("empty");
        let path = write_collection::<Event>(&dir, "events", &[]).unwrap();

        assert!(path.ends_with("events.geojson"));
        assert!(read_features(&path).is_empty());
    }

    #[test]
    fn ungeotagged_entities_contribute_no_feature() {
        let dir = out_dir("ungeotagged");
        let items = vec![event("1").with_coordinate(13.0, 42.0), event("2")];

        let path = write_collection(&dir, "events", &items).unwrap();
        let features = read_features(&path);

        assert_eq!(features.len(), 1);
        let properties = features[0].properties.as_ref().unwrap();
        assert_eq!(properties["id"], "1");
        assert_eq!(properties["time_posted"], "2024-08-24T03:36:00+00:00");
    }

    #[test]
    fn cluster_features_carry_their_point_count() {
        let dir = out_dir("clusters");
        let clusters = vec![Cluster {
            hull: polygon![
                (x: 13.0, y: 42.0), (x: 13.2, y: 42.0), (x: 13.1, y: 42.2), (x: 13.0, y: 42.0),
            ],
            point_count: 7,
        }];

        let path = write_collection(&dir, "clusters", &clusters).unwrap();
        let features = read_features(&path);

        assert_eq!(features.len(), 1);
        assert_eq!(
            features[0].properties.as_ref().unwrap()["point_count"],
            "7"
        );
    }

    #[test]
    fn risk_area_fields_list_municipality_names() {
        let dir = out_dir("risk");
        let area = RiskArea {
            geometry: geo::MultiPolygon(vec![polygon![
                (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
            ]]),
            municipalities: vec![
                Municipality {
                    name: "Amatrice".to_string(),
                    province: "RI".to_string(),
                    country_code: "IT".to_string(),
                    population: 2646,
                    geometry: geo::MultiPolygon(vec![]),
                },
                Municipality {
                    name: "Accumoli".to_string(),
                    province: "RI".to_string(),
                    country_code: "IT".to_string(),
                    population: 653,
                    geometry: geo::MultiPolygon(vec![]),
                },
            ],
            population: 3299,
        };

        let path = write_collection(&dir, "risk_area", &[area]).unwrap();
        let features = read_features(&path);

        assert_eq!(features.len(), 1);
        let properties = features[0].properties.as_ref().unwrap();
        assert_eq!(properties["municipalities"], "[Amatrice, Accumoli]");
        assert_eq!(properties["population"], "3299");
    }

    #[test]
    fn empty_risk_area_writes_zero_features() {
        let dir = out_dir("risk-empty");
        let path = write_collection(&dir, "risk_area", &[RiskArea::empty()]).unwrap();
        assert!(read_features(&path).is_empty());
    }
}
