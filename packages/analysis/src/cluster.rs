//! Density-based spatial clustering of event coordinates.
//!
//! DBSCAN over an R-tree: a point with at least `min_samples` neighbors
//! within `eps` (itself included) is a core point; clusters grow from core
//! points, border points attach without expanding, and everything else is
//! noise and gets discarded. Each retained cluster is reduced to the convex
//! hull of its core points.

use std::collections::{BTreeSet, VecDeque};

use geo::{ConvexHull, MultiPoint, Point};
use quakewatch_analysis_models::Cluster;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::geometry;

/// Radius of the circular hull synthesized for clusters with fewer than
/// three distinct points, in degrees.
pub const DEGENERATE_BUFFER_RADIUS: f64 = 0.01;

/// Error raised when clustering cannot run at all.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// The input point set was empty.
    #[error("cannot cluster an empty point set")]
    EmptyInput,
}

/// Clustering parameters.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    /// Neighborhood radius. When `standardize` is set this is measured in
    /// standardized (zero mean, unit variance) coordinate space, not
    /// degrees.
    pub eps: f64,
    /// Minimum neighborhood size (the point itself included) for a core
    /// point.
    pub min_samples: usize,
    /// Standardize coordinates before distance computation.
    pub standardize: bool,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps: 0.5,
            min_samples: 5,
            standardize: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Cluster(usize),
}

/// Groups event coordinates into spatial concentration polygons.
///
/// Noise points are dropped. Every returned cluster carries a valid
/// polygon: the convex hull of its core points, or the boundary of a
/// [`DEGENERATE_BUFFER_RADIUS`] circle when the cluster has fewer than
/// three distinct points. A point set with no dense region yields an
/// empty vec.
///
/// # Errors
///
/// Returns [`ClusterError::EmptyInput`] if `points` is empty.
pub fn cluster(points: &[Point<f64>], params: &ClusterParams) -> Result<Vec<Cluster>, ClusterError> {
    if points.is_empty() {
        return Err(ClusterError::EmptyInput);
    }

    let space: Vec<[f64; 2]> = if params.standardize {
        standardized(points)
    } else {
        points.iter().map(|p| [p.x(), p.y()]).collect()
    };

    let tree = RTree::bulk_load(
        space
            .iter()
            .enumerate()
            .map(|(i, pos)| GeomWithData::new(*pos, i))
            .collect(),
    );
    let eps_sq = params.eps * params.eps;
    let neighbors_of = |i: usize| -> Vec<usize> {
        tree.locate_within_distance(space[i], eps_sq)
            .map(|entry| entry.data)
            .collect()
    };

    let mut labels = vec![Label::Unvisited; points.len()];
    let mut core = vec![false; points.len()];
    let mut total_clusters = 0usize;

    for i in 0..points.len() {
        if labels[i] != Label::Unvisited {
            continue;
        }
        let neighbors = neighbors_of(i);
        if neighbors.len() < params.min_samples {
            labels[i] = Label::Noise;
            continue;
        }

        let id = total_clusters;
        total_clusters += 1;
        labels[i] = Label::Cluster(id);
        core[i] = true;

        let mut queue: VecDeque<usize> = neighbors.into_iter().filter(|&j| j != i).collect();
        while let Some(j) = queue.pop_front() {
            if labels[j] == Label::Noise {
                // Border point: joins the cluster but does not expand it.
                labels[j] = Label::Cluster(id);
            }
            if labels[j] != Label::Unvisited {
                continue;
            }
            labels[j] = Label::Cluster(id);

            let reachable = neighbors_of(j);
            if reachable.len() >= params.min_samples {
                core[j] = true;
                queue.extend(reachable);
            }
        }
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); total_clusters];
    for (i, label) in labels.iter().enumerate() {
        if let Label::Cluster(id) = label {
            if core[i] {
                members[*id].push(i);
            }
        }
    }

    let clusters = members
        .into_iter()
        .filter(|m| !m.is_empty())
        .map(|m| hull_of(points, &m))
        .collect();
    Ok(clusters)
}

/// Builds the hull polygon for one cluster from its core member indices.
fn hull_of(points: &[Point<f64>], members: &[usize]) -> Cluster {
    let core_points: Vec<Point<f64>> = members.iter().map(|&i| points[i]).collect();

    let distinct: BTreeSet<(u64, u64)> = core_points
        .iter()
        .map(|p| (p.x().to_bits(), p.y().to_bits()))
        .collect();

    let hull = if distinct.len() >= 3 {
        let hull = MultiPoint::from(core_points.clone()).convex_hull();
        // Collinear member sets collapse to a degenerate ring; pad those
        // the same way as tiny clusters.
        if hull.exterior().coords().count() >= 4 {
            hull
        } else {
            geometry::circle(core_points[0], DEGENERATE_BUFFER_RADIUS)
        }
    } else {
        geometry::circle(core_points[0], DEGENERATE_BUFFER_RADIUS)
    };

    Cluster {
        hull,
        point_count: members.len(),
    }
}

/// Maps points into zero-mean, unit-variance space per axis.
///
/// A degenerate axis (zero variance) is left unscaled to avoid division
/// by zero.
fn standardized(points: &[Point<f64>]) -> Vec<[f64; 2]> {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;

    let mean_x = points.iter().map(|p| p.x()).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y()).sum::<f64>() / n;

    let var_x = points.iter().map(|p| (p.x() - mean_x).powi(2)).sum::<f64>() / n;
    let var_y = points.iter().map(|p| (p.y() - mean_y).powi(2)).sum::<f64>() / n;

    let std_x = if var_x > 0.0 { var_x.sqrt() } else { 1.0 };
    let std_y = if var_y > 0.0 { var_y.sqrt() } else { 1.0 };

    points
        .iter()
        .map(|p| [(p.x() - mean_x) / std_x, (p.y() - mean_y) / std_y])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(cx: f64, cy: f64) -> Vec<Point<f64>> {
        vec![
            Point::new(cx, cy),
            Point::new(cx + 0.01, cy),
            Point::new(cx, cy + 0.01),
            Point::new(cx - 0.01, cy - 0.005),
            Point::new(cx + 0.005, cy - 0.01),
        ]
    }

    fn distinct_boundary_coords(cluster: &Cluster) -> usize {
        let coords: BTreeSet<(u64, u64)> = cluster
            .hull
            .exterior()
            .coords()
            .map(|c| (c.x.to_bits(), c.y.to_bits()))
            .collect();
        coords.len()
    }

    #[test]
    fn empty_input_is_an_error() {
        let result = cluster(&[], &ClusterParams::default());
        assert!(matches!(result, Err(ClusterError::EmptyInput)));
    }

    #[test]
    fn sparse_points_yield_no_clusters() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
        ];
        let params = ClusterParams {
            eps: 0.1,
            min_samples: 3,
            standardize: false,
        };
        assert!(cluster(&points, &params).unwrap().is_empty());
    }

    #[test]
    fn two_blobs_form_two_clusters() {
        let mut points = blob(13.0, 42.0);
        points.extend(blob(16.0, 39.0));

        let params = ClusterParams {
            eps: 0.1,
            min_samples: 3,
            standardize: false,
        };
        let clusters = cluster(&points, &params).unwrap();

        assert_eq!(clusters.len(), 2);
        for c in &clusters {
            assert_eq!(c.point_count, 5);
            assert!(distinct_boundary_coords(c) >= 3);
        }
    }

    #[test]
    fn standardization_separates_distant_blobs() {
        let mut points = blob(13.0, 42.0);
        points.extend(blob(16.0, 39.0));

        let params = ClusterParams {
            eps: 0.5,
            min_samples: 3,
            standardize: true,
        };
        let clusters = cluster(&points, &params).unwrap();
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn noise_points_are_discarded() {
        let mut points = blob(13.0, 42.0);
        points.push(Point::new(50.0, 50.0));

        let params = ClusterParams {
            eps: 0.1,
            min_samples: 3,
            standardize: false,
        };
        let clusters = cluster(&points, &params).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].point_count, 5);
    }

    #[test]
    fn tiny_cluster_is_padded_to_a_circular_hull() {
        let points = vec![Point::new(13.0, 42.0), Point::new(13.001, 42.0)];
        let params = ClusterParams {
            eps: 0.1,
            min_samples: 2,
            standardize: false,
        };
        let clusters = cluster(&points, &params).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].point_count, 2);
        assert!(distinct_boundary_coords(&clusters[0]) >= 3);
    }

    #[test]
    fn collinear_cluster_is_padded_to_a_circular_hull() {
        let points = vec![
            Point::new(13.0, 42.0),
            Point::new(13.01, 42.0),
            Point::new(13.02, 42.0),
            Point::new(13.03, 42.0),
        ];
        let params = ClusterParams {
            eps: 0.05,
            min_samples: 2,
            standardize: false,
        };
        let clusters = cluster(&points, &params).unwrap();

        assert_eq!(clusters.len(), 1);
        assert!(distinct_boundary_coords(&clusters[0]) >= 3);
    }
}
