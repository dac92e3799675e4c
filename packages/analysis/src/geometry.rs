//! Buffering helpers shared by the clusterer, scorer, and aggregator.
//!
//! `geo` ships union/intersection via [`BooleanOps`] but no dilation, so
//! buffering is built on top of it: the buffer of a polygon at distance
//! `d` is the union of the polygon itself, a rectangle swept along each
//! exterior edge, and a disk at each exterior vertex (the Minkowski sum
//! with a disk, up to disk discretization).

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Point, Polygon};

/// Number of segments used to discretize a buffer disk.
const CIRCLE_SEGMENTS: usize = 32;

/// A closed circle polygon of the given radius around a point.
#[must_use]
pub fn circle(center: Point<f64>, radius: f64) -> Polygon<f64> {
    #[allow(clippy::cast_precision_loss)]
    let coords: Vec<Coord<f64>> = (0..=CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = std::f64::consts::TAU * (i as f64) / (CIRCLE_SEGMENTS as f64);
            Coord {
                x: center.x() + radius * angle.cos(),
                y: center.y() + radius * angle.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// Dilates a polygon outward by `distance`.
///
/// Non-positive distances return the polygon unchanged. Interior rings are
/// not shrunk; the catalogs and cluster hulls this operates on carry none.
#[must_use]
pub fn buffer_polygon(polygon: &Polygon<f64>, distance: f64) -> MultiPolygon<f64> {
    if distance <= 0.0 {
        return MultiPolygon(vec![polygon.clone()]);
    }

    let mut out = MultiPolygon(vec![polygon.clone()]);
    for line in polygon.exterior().lines() {
        if let Some(quad) = edge_quad(line.start, line.end, distance) {
            out = out.union(&MultiPolygon(vec![quad]));
        }
    }
    for coord in polygon.exterior().coords() {
        let disk = circle(Point::from(*coord), distance);
        out = out.union(&MultiPolygon(vec![disk]));
    }
    out
}

/// Dilates every member of a multi-polygon and unions the results.
#[must_use]
pub fn buffer_multi_polygon(mp: &MultiPolygon<f64>, distance: f64) -> MultiPolygon<f64> {
    let mut out = MultiPolygon(Vec::new());
    for polygon in &mp.0 {
        out = out.union(&buffer_polygon(polygon, distance));
    }
    out
}

/// Rectangle covering the band of width `2 * distance` around an edge.
///
/// Returns `None` for degenerate zero-length edges; the vertex disks
/// already cover those.
fn edge_quad(start: Coord<f64>, end: Coord<f64>, distance: f64) -> Option<Polygon<f64>> {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length = dx.hypot(dy);
    if length == 0.0 {
        return None;
    }

    let nx = -dy / length * distance;
    let ny = dx / length * distance;

    Some(Polygon::new(
        LineString::new(vec![
            Coord {
                x: start.x + nx,
                y: start.y + ny,
            },
            Coord {
                x: end.x + nx,
                y: end.y + ny,
            },
            Coord {
                x: end.x - nx,
                y: end.y - ny,
            },
            Coord {
                x: start.x - nx,
                y: start.y - ny,
            },
            Coord {
                x: start.x + nx,
                y: start.y + ny,
            },
        ]),
        vec![],
    ))
}
