//! 2-D k-d tree over observation coordinates.
//!
//! Built once per interpolation run; answers k-nearest-neighbor queries in
//! O(k log n) on average instead of scanning every station per pixel.

use crate::geometry::ObservationPoint;
use std::cmp::Ordering;

#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<Node>,
    points: Vec<ObservationPoint>,
}

#[derive(Debug)]
struct Node {
    point: usize,
    /// 0 splits on x, 1 on y
    axis: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// One neighbor returned by [`KdTree::k_nearest`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub point: ObservationPoint,
    pub distance_sq: f64,
}

impl KdTree {
    pub fn build(points: &[ObservationPoint]) -> Self {
        let points = points.to_vec();
        let mut nodes = Vec::with_capacity(points.len());

        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            build_node(&points, &mut indices, 0, &mut nodes);
        }

        Self { nodes, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Up to `k` nearest points to (qx, qy), closest first
    pub fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        // Ascending by distance, capped at k entries
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.search(0, qx, qy, k, &mut best);

        best.into_iter()
            .map(|(distance_sq, idx)| Neighbor {
                point: self.points[idx],
                distance_sq,
            })
            .collect()
    }

    fn search(&self, node_idx: usize, qx: f64, qy: f64, k: usize, best: &mut Vec<(f64, usize)>) {
        let node = &self.nodes[node_idx];
        let p = &self.points[node.point];
        let dist_sq = p.dist_sq(qx, qy);

        let worst = worst_distance(best, k);
        if dist_sq < worst {
            let pos = best.partition_point(|&(d, _)| d <= dist_sq);
            best.insert(pos, (dist_sq, node.point));
            best.truncate(k);
        }

        let diff = if node.axis == 0 { qx - p.x } else { qy - p.y };
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = near {
            self.search(child, qx, qy, k, best);
        }

        if diff * diff < worst_distance(best, k) {
            if let Some(child) = far {
                self.search(child, qx, qy, k, best);
            }
        }
    }
}

fn worst_distance(best: &[(f64, usize)], k: usize) -> f64 {
    if best.len() < k {
        f64::INFINITY
    } else {
        best[best.len() - 1].0
    }
}

fn build_node(
    points: &[ObservationPoint],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<Node>,
) -> usize {
    let axis = (depth % 2) as u8;
    let coord = |i: usize| if axis == 0 { points[i].x } else { points[i].y };

    indices.sort_by(|&a, &b| coord(a).partial_cmp(&coord(b)).unwrap_or(Ordering::Equal));

    let median = indices.len() / 2;
    let node_idx = nodes.len();
    nodes.push(Node {
        point: indices[median],
        axis,
        left: None,
        right: None,
    });

    let (left, rest) = indices.split_at_mut(median);
    let right = &mut rest[1..];

    if !left.is_empty() {
        let child = build_node(points, left, depth + 1, nodes);
        nodes[node_idx].left = Some(child);
    }
    if !right.is_empty() {
        let child = build_node(points, right, depth + 1, nodes);
        nodes[node_idx].right = Some(child);
    }

    node_idx
}
