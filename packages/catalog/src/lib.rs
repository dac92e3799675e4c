#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Reference catalog loading for the risk analysis chain.
//!
//! Two read-only datasets back every analysis batch: the seismic fault
//! source catalog and the municipality/population catalog. Both load from
//! on-disk `GeoJSON` feature collections. Municipality geometries stored in
//! a projected CRS are reprojected into WGS84 at load, and the catalog
//! builds an R-tree so containment queries only test features whose
//! envelope intersects the risk polygon.

pub mod reproject;

use std::path::{Path, PathBuf};

use geo::{BoundingRect, Contains, MultiPolygon, Polygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};

/// Error raised when a reference catalog cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The seismic source dataset is missing or unreadable.
    #[error("seismic source catalog unavailable at {path}: {message}")]
    SeismicUnavailable {
        /// Dataset path that failed to load.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// The municipality dataset is missing or unreadable.
    #[error("municipality catalog unavailable at {path}: {message}")]
    MunicipalitiesUnavailable {
        /// Dataset path that failed to load.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// Reprojection into WGS84 failed.
    #[error("reprojection failed: {message}")]
    Reprojection {
        /// Description of what went wrong.
        message: String,
    },
}

/// One known seismic fault source from the reference catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultSource {
    /// Stable catalog key.
    pub id: String,
    /// Fault source outline.
    pub geometry: Polygon<f64>,
}

/// The seismic fault source catalog, in file order.
///
/// Insertion order is load-bearing: the scorer breaks ranking ties by
/// catalog position.
#[derive(Debug, Clone)]
pub struct SeismicCatalog {
    sources: Vec<FaultSource>,
}

impl SeismicCatalog {
    /// Loads the catalog from a `GeoJSON` feature collection.
    ///
    /// Feature ids come from an `id` property, falling back to the feature
    /// id member. Features without a polygonal geometry or an id are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::SeismicUnavailable`] if the file is missing,
    /// unreadable, or not a feature collection.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let unavailable = |message: String| CatalogError::SeismicUnavailable {
            path: path.to_path_buf(),
            message,
        };

        let text = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        let features = parse_feature_collection(&text).map_err(unavailable)?;

        let mut sources = Vec::new();
        for feature in features {
            let Some(id) = feature_id(&feature) else {
                log::warn!("Skipping seismic source without an id");
                continue;
            };
            let Some(geometry) = feature_polygon(&feature) else {
                log::warn!("Skipping seismic source {id}: no polygonal geometry");
                continue;
            };
            sources.push(FaultSource { id, geometry });
        }

        log::info!("Loaded {} seismic sources from {}", sources.len(), path.display());
        Ok(Self { sources })
    }

    /// Builds a catalog directly from fault sources, preserving order.
    #[must_use]
    pub const fn from_sources(sources: Vec<FaultSource>) -> Self {
        Self { sources }
    }

    /// The fault sources in catalog insertion order.
    #[must_use]
    pub fn sources(&self) -> &[FaultSource] {
        &self.sources
    }

    /// Number of fault sources in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the catalog holds no fault sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// One settlement from the municipality/population catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Municipality {
    /// Settlement name.
    pub name: String,
    /// Administrative province.
    pub province: String,
    /// ISO country code.
    pub country_code: String,
    /// Resident population.
    pub population: u64,
    /// Settlement footprint, in WGS84 after loading.
    pub geometry: MultiPolygon<f64>,
}

/// A municipality stored in the R-tree with its envelope.
struct MunicipalityEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for MunicipalityEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The municipality catalog with an R-tree index for containment queries.
pub struct MunicipalityCatalog {
    municipalities: Vec<Municipality>,
    tree: RTree<MunicipalityEntry>,
}

impl MunicipalityCatalog {
    /// Loads the catalog from a `GeoJSON` feature collection.
    ///
    /// `source_projection` is the proj string of the dataset's CRS when its
    /// geometries are stored projected (the reference dataset ships in UTM
    /// 32N); pass `None` for a dataset already in WGS84. Features missing a
    /// name, population, or polygonal geometry are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::MunicipalitiesUnavailable`] if the file is
    /// missing, unreadable, or not a feature collection, and
    /// [`CatalogError::Reprojection`] if the CRS transform fails.
    pub fn load(path: &Path, source_projection: Option<&str>) -> Result<Self, CatalogError> {
        let unavailable = |message: String| CatalogError::MunicipalitiesUnavailable {
            path: path.to_path_buf(),
            message,
        };

        let text = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        let features = parse_feature_collection(&text).map_err(unavailable)?;

        let transform = source_projection
            .map(reproject::ToWgs84::new)
            .transpose()?;

        let mut municipalities = Vec::new();
        for feature in features {
            let Some(name) = string_property(&feature, &["name"]) else {
                log::warn!("Skipping municipality without a name");
                continue;
            };
            let Some(population) = integer_property(&feature, &["population"]) else {
                log::warn!("Skipping municipality {name}: no population");
                continue;
            };
            let Some(mut geometry) = feature_multi_polygon(&feature) else {
                log::warn!("Skipping municipality {name}: no polygonal geometry");
                continue;
            };
            if let Some(transform) = &transform {
                geometry = transform.multi_polygon(&geometry)?;
            }

            municipalities.push(Municipality {
                name,
                province: string_property(&feature, &["province"]).unwrap_or_default(),
                country_code: string_property(&feature, &["country_code", "country code"])
                    .unwrap_or_default(),
                population,
                geometry,
            });
        }

        log::info!(
            "Loaded {} municipalities from {}",
            municipalities.len(),
            path.display()
        );
        Ok(Self::from_municipalities(municipalities))
    }

    /// Builds a catalog (and its R-tree) directly from municipalities.
    #[must_use]
    pub fn from_municipalities(municipalities: Vec<Municipality>) -> Self {
        let entries = municipalities
            .iter()
            .enumerate()
            .map(|(index, m)| MunicipalityEntry {
                index,
                envelope: envelope_of(&m.geometry),
            })
            .collect();
        Self {
            municipalities,
            tree: RTree::bulk_load(entries),
        }
    }

    /// All municipalities in load order.
    #[must_use]
    pub fn municipalities(&self) -> &[Municipality] {
        &self.municipalities
    }

    /// Number of municipalities in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.municipalities.len()
    }

    /// Whether the catalog holds no municipalities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.municipalities.is_empty()
    }

    /// Municipalities whose geometry lies entirely within `area`.
    ///
    /// Strict containment, not mere intersection: a settlement only
    /// partially overlapping the area is excluded. The R-tree prunes to
    /// features whose envelope intersects the area's bounding box before
    /// the exact containment test runs.
    #[must_use]
    pub fn contained_in(&self, area: &MultiPolygon<f64>) -> Vec<&Municipality> {
        let Some(rect) = area.bounding_rect() else {
            return Vec::new();
        };
        let query = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );

        let mut matched: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .filter(|entry| area.contains(&self.municipalities[entry.index].geometry))
            .map(|entry| entry.index)
            .collect();
        matched.sort_unstable();
        matched.into_iter().map(|i| &self.municipalities[i]).collect()
    }
}

/// Parses a `GeoJSON` string and returns its features.
fn parse_feature_collection(text: &str) -> Result<Vec<geojson::Feature>, String> {
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| e.to_string())?;
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc.features),
        _ => Err("expected a FeatureCollection".to_string()),
    }
}

/// Extracts a feature id from the `id` property or the id member.
fn feature_id(feature: &geojson::Feature) -> Option<String> {
    if let Some(id) = string_property(feature, &["id"]) {
        return Some(id);
    }
    match &feature.id {
        Some(geojson::feature::Id::String(s)) => Some(s.clone()),
        Some(geojson::feature::Id::Number(n)) => Some(n.to_string()),
        None => None,
    }
}

/// Reads the first matching property as a string.
fn string_property(feature: &geojson::Feature, keys: &[&str]) -> Option<String> {
    let properties = feature.properties.as_ref()?;
    keys.iter().find_map(|key| {
        properties.get(*key).and_then(|value| match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

/// Reads the first matching property as a non-negative integer.
///
/// Population fields arrive as numbers or numeric strings depending on the
/// dataset export.
fn integer_property(feature: &geojson::Feature, keys: &[&str]) -> Option<u64> {
    let properties = feature.properties.as_ref()?;
    keys.iter().find_map(|key| {
        properties.get(*key).and_then(|value| match value {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    })
}

/// Converts a feature's geometry into a [`Polygon`].
///
/// A `MultiPolygon` contributes its first member, matching how the
/// reference shapefile's multi-part sources are read.
fn feature_polygon(feature: &geojson::Feature) -> Option<Polygon<f64>> {
    match feature_geometry(feature)? {
        geo::Geometry::Polygon(p) => Some(p),
        geo::Geometry::MultiPolygon(mp) => mp.0.into_iter().next(),
        _ => None,
    }
}

/// Converts a feature's geometry into a [`MultiPolygon`].
fn feature_multi_polygon(feature: &geojson::Feature) -> Option<MultiPolygon<f64>> {
    match feature_geometry(feature)? {
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}

fn feature_geometry(feature: &geojson::Feature) -> Option<geo::Geometry<f64>> {
    let geometry = feature.geometry.as_ref()?;
    geometry.clone().try_into().ok()
}

/// Computes the bounding box envelope for a [`MultiPolygon`].
fn envelope_of(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
