//! CRS transforms into WGS84 for projected catalog datasets.
//!
//! The municipality reference dataset ships in a projected CRS (UTM 32N),
//! while the whole analysis chain works in WGS84 longitude/latitude.
//! Geometries are transformed once at load time.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use proj4rs::proj::Proj;

use crate::CatalogError;

/// Proj string for the WGS84 longitude/latitude target.
const WGS84_PROJ: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// A transform from a projected source CRS into WGS84 degrees.
///
/// Source coordinates must be in the projected CRS's native units
/// (meters for the UTM dataset); datasets already in WGS84 skip the
/// transform entirely.
pub struct ToWgs84 {
    from: Proj,
    to: Proj,
}

impl ToWgs84 {
    /// Builds a transform from the given source proj string.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Reprojection`] if either proj string fails
    /// to parse.
    pub fn new(source_projection: &str) -> Result<Self, CatalogError> {
        let from = Proj::from_proj_string(source_projection).map_err(|e| {
            CatalogError::Reprojection {
                message: format!("invalid source projection {source_projection:?}: {e}"),
            }
        })?;
        let to = Proj::from_proj_string(WGS84_PROJ).map_err(|e| CatalogError::Reprojection {
            message: format!("invalid WGS84 target projection: {e}"),
        })?;
        Ok(Self { from, to })
    }

    /// Transforms a single coordinate into WGS84 degrees.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Reprojection`] if the transform fails for
    /// this coordinate.
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, CatalogError> {
        let mut point = (coord.x, coord.y, 0.0_f64);
        proj4rs::transform::transform(&self.from, &self.to, &mut point).map_err(|e| {
            CatalogError::Reprojection {
                message: format!("({}, {}): {e}", coord.x, coord.y),
            }
        })?;
        // proj4rs yields geographic coordinates in radians.
        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }

    /// Transforms every coordinate of a [`MultiPolygon`] into WGS84.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Reprojection`] if any coordinate fails to
    /// transform.
    pub fn multi_polygon(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, CatalogError> {
        let polygons = mp
            .0
            .iter()
            .map(|p| self.polygon(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MultiPolygon(polygons))
    }

    fn polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>, CatalogError> {
        let exterior = self.ring(polygon.exterior())?;
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| self.ring(ring))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    fn ring(&self, ring: &LineString<f64>) -> Result<LineString<f64>, CatalogError> {
        let coords = ring
            .coords()
            .map(|c| self.coord(*c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LineString::new(coords))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTM_32N: &str = "+proj=utm +zone=32 +ellps=WGS84 +datum=WGS84 +units=m +no_defs";

    #[test]
    fn utm_32n_central_meridian_maps_to_nine_degrees() {
        let transform = ToWgs84::new(UTM_32N).unwrap();

        // Easting 500km is the UTM central meridian by construction; the
        // northing corresponds to roughly 42N.
        let coord = transform
            .coord(Coord {
                x: 500_000.0,
                y: 4_649_776.0,
            })
            .unwrap();

        assert!((coord.x - 9.0).abs() < 1e-6, "lon was {}", coord.x);
        assert!((coord.y - 42.0).abs() < 0.05, "lat was {}", coord.y);
    }

    #[test]
    fn polygon_rings_survive_reprojection() {
        let transform = ToWgs84::new(UTM_32N).unwrap();
        let square = Polygon::new(
            LineString::from(vec![
                (400_000.0, 4_600_000.0),
                (410_000.0, 4_600_000.0),
                (410_000.0, 4_610_000.0),
                (400_000.0, 4_610_000.0),
                (400_000.0, 4_600_000.0),
            ]),
            vec![],
        );

        let out = transform
            .multi_polygon(&MultiPolygon(vec![square]))
            .unwrap();

        assert_eq!(out.0.len(), 1);
        assert_eq!(out.0[0].exterior().coords().count(), 5);
        for c in out.0[0].exterior().coords() {
            assert!((5.0..12.0).contains(&c.x), "lon out of range: {}", c.x);
            assert!((40.0..44.0).contains(&c.y), "lat out of range: {}", c.y);
        }
    }

    #[test]
    fn invalid_projection_string_is_rejected() {
        let result = ToWgs84::new("+proj=not_a_projection");
        assert!(matches!(result, Err(CatalogError::Reprojection { .. })));
    }
}
