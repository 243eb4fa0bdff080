//! Inverse Distance Weighting over the k nearest stations.
//!
//! ```text
//! z(q) = Σ w_i z_i / Σ w_i,   w_i = 1 / (d_i^p + ε)
//! ```
//!
//! The ε term keeps the weight finite when a query sits exactly on a
//! station, where that station then dominates the blend.

use crate::error::{Result, SurfaceError};
use crate::geometry::{ObservationPoint, QueryGrid};
use crate::kdtree::{KdTree, Neighbor};
use log::{debug, info};
use rayon::prelude::*;

pub const DISTANCE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdwParams {
    /// Distance exponent, >= 0
    pub power: f64,
    /// Neighbors per query, clamped to the number of stations
    pub neighbors: usize,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            neighbors: 4,
        }
    }
}

impl IdwParams {
    pub fn validate(&self) -> Result<()> {
        if !self.power.is_finite() || self.power < 0.0 {
            return Err(SurfaceError::InvalidParameter(format!(
                "power must be a finite value >= 0, got {}",
                self.power
            )));
        }
        if self.neighbors == 0 {
            return Err(SurfaceError::InvalidParameter(
                "neighbors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Estimate a value at every query coordinate, in query order
pub fn interpolate(
    points: &[ObservationPoint],
    queries: &QueryGrid,
    params: IdwParams,
) -> Result<Vec<f64>> {
    params.validate()?;
    if points.is_empty() {
        return Err(SurfaceError::InsufficientData);
    }

    let k = params.neighbors.min(points.len());
    info!(
        "IDW over {} stations, {} queries (k={}, power={})",
        points.len(),
        queries.len(),
        k,
        params.power
    );

    let tree = KdTree::build(points);
    debug!("Built k-d tree with {} points", tree.len());

    // Each query is independent; collect keeps row-major order
    let estimates = queries
        .coords()
        .par_iter()
        .map(|&(qx, qy)| blend(&tree.k_nearest(qx, qy, k), params.power))
        .collect();

    Ok(estimates)
}

/// Weighted average of the neighbor values.
///
/// Weights are normalized before summing so a lone neighbor yields its
/// value exactly (w / w == 1.0).
fn blend(neighbors: &[Neighbor], power: f64) -> f64 {
    let weights: Vec<f64> = neighbors
        .iter()
        .map(|n| 1.0 / (n.distance_sq.sqrt().powf(power) + DISTANCE_EPSILON))
        .collect();
    let sum_w: f64 = weights.iter().sum();

    neighbors
        .iter()
        .zip(&weights)
        .map(|(n, w)| (w / sum_w) * n.point.value)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(coords: Vec<(f64, f64)>) -> QueryGrid {
        let n = coords.len();
        QueryGrid::new(n, 1, coords).unwrap()
    }

    fn two_stations() -> Vec<ObservationPoint> {
        vec![
            ObservationPoint::new(0.0, 0.0, 10.0),
            ObservationPoint::new(1.0, 1.0, 20.0),
        ]
    }

    #[test]
    fn test_empty_points() {
        let result = interpolate(&[], &queries(vec![(0.0, 0.0)]), IdwParams::default());
        assert!(matches!(result, Err(SurfaceError::InsufficientData)));
    }

    #[test]
    fn test_invalid_params() {
        let q = queries(vec![(0.0, 0.0)]);
        let bad_power = IdwParams {
            power: -1.0,
            neighbors: 4,
        };
        assert!(interpolate(&two_stations(), &q, bad_power).is_err());

        let bad_k = IdwParams {
            power: 2.0,
            neighbors: 0,
        };
        assert!(interpolate(&two_stations(), &q, bad_k).is_err());
    }

    #[test]
    fn test_exact_hit_returns_station_value() {
        let q = queries(vec![(0.0, 0.0), (1.0, 1.0)]);
        let params = IdwParams {
            power: 2.0,
            neighbors: 2,
        };
        let result = interpolate(&two_stations(), &q, params).unwrap();
        assert!((result[0] - 10.0).abs() < 1e-9);
        assert!((result[1] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_equidistant_blend() {
        let q = queries(vec![(0.5, 0.5), (1.0, 0.0), (0.0, 1.0)]);
        let params = IdwParams {
            power: 2.0,
            neighbors: 2,
        };
        let result = interpolate(&two_stations(), &q, params).unwrap();
        for value in result {
            assert!((value - 15.0).abs() < 1e-9, "expected 15, got {}", value);
        }
    }

    #[test]
    fn test_single_station_everywhere() {
        let points = vec![ObservationPoint::new(5.0, 5.0, 42.0)];
        let q = queries(vec![(0.0, 0.0), (5.0, 5.0), (100.0, -3.0)]);
        let result = interpolate(&points, &q, IdwParams::default()).unwrap();
        for value in result {
            assert!((value - 42.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_only_k_nearest_contribute() {
        // Far station must be ignored with k = 1
        let points = vec![
            ObservationPoint::new(0.0, 0.0, 1.0),
            ObservationPoint::new(100.0, 0.0, 1000.0),
        ];
        let q = queries(vec![(10.0, 0.0)]);
        let params = IdwParams {
            power: 2.0,
            neighbors: 1,
        };
        let result = interpolate(&points, &q, params).unwrap();
        assert!((result[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_higher_power_sharpens() {
        let points = vec![
            ObservationPoint::new(0.0, 0.0, 0.0),
            ObservationPoint::new(4.0, 0.0, 100.0),
        ];
        let q = queries(vec![(1.0, 0.0)]);
        let low = interpolate(
            &points,
            &q,
            IdwParams {
                power: 1.0,
                neighbors: 2,
            },
        )
        .unwrap();
        let high = interpolate(
            &points,
            &q,
            IdwParams {
                power: 4.0,
                neighbors: 2,
            },
        )
        .unwrap();
        // d = 1 and 3: power 1 gives 25, power 4 gives 100/82
        assert!((low[0] - 25.0).abs() < 1e-9);
        assert!(high[0] < low[0]);
    }

    #[test]
    fn test_zero_power_is_plain_mean() {
        let points = vec![
            ObservationPoint::new(0.0, 0.0, 2.0),
            ObservationPoint::new(9.0, 0.0, 4.0),
            ObservationPoint::new(0.0, 7.0, 9.0),
        ];
        let q = queries(vec![(1.0, 1.0)]);
        let params = IdwParams {
            power: 0.0,
            neighbors: 3,
        };
        let result = interpolate(&points, &q, params).unwrap();
        assert!((result[0] - 5.0).abs() < 1e-9);
    }
}
