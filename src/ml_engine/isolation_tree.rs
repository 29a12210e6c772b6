//! Isolation tree
//!
//! A randomized binary partition tree stored as a flat node arena. Each
//! internal node splits on one feature at a value drawn uniformly from that
//! feature's range over the node's subsample; each leaf records the depth it
//! terminated at and how many training points reached it.
//!
//! Construction recursion is bounded by `max_depth` (ceil(log2(subsample))),
//! so pathological subsamples cannot blow the stack.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Euler–Mascheroni constant, used in the harmonic-number approximation.
const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Expected path length of an unsuccessful search in a random binary search
/// tree over `n` points: `c(n) = 2H(n−1) − 2(n−1)/n`.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Node {
    Internal {
        feature: usize,
        split: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        depth: usize,
        size: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
    max_depth: usize,
}

impl IsolationTree {
    /// Build a tree over the rows of `data` selected by `indices`.
    ///
    /// `indices` is reordered in place while partitioning.
    pub fn build<R: Rng + ?Sized>(
        data: &[Vec<f64>],
        indices: &mut [usize],
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(2 * indices.len().max(1)),
            max_depth,
        };
        tree.grow(data, indices, 0, rng);
        tree
    }

    /// Returns the arena index of the node built for this subsample.
    fn grow<R: Rng + ?Sized>(
        &mut self,
        data: &[Vec<f64>],
        indices: &mut [usize],
        depth: usize,
        rng: &mut R,
    ) -> usize {
        if depth >= self.max_depth || indices.len() <= 1 {
            return self.push_leaf(depth, indices.len());
        }

        // Only features that actually vary within this subsample can split it
        let dims = data[indices[0]].len();
        let splittable: Vec<(usize, f64, f64)> = (0..dims)
            .filter_map(|f| {
                let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    (lo.min(data[i][f]), hi.max(data[i][f]))
                });
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();

        if splittable.is_empty() {
            return self.push_leaf(depth, indices.len());
        }

        let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
        let split = rng.gen_range(lo..hi);

        // In-place partition: [< split | >= split]. lo <= split < hi, so the
        // right side always holds the max; the left is empty only when
        // split == lo, which grows a size-0 leaf.
        let mut boundary = 0;
        for k in 0..indices.len() {
            if data[indices[k]][feature] < split {
                indices.swap(k, boundary);
                boundary += 1;
            }
        }

        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf { depth, size: 0 }); // placeholder until children exist
        let (left_idx, right_idx) = indices.split_at_mut(boundary);
        let left = self.grow(data, left_idx, depth + 1, rng);
        let right = self.grow(data, right_idx, depth + 1, rng);
        self.nodes[slot] = Node::Internal {
            feature,
            split,
            left,
            right,
        };
        slot
    }

    fn push_leaf(&mut self, depth: usize, size: usize) -> usize {
        self.nodes.push(Node::Leaf { depth, size });
        self.nodes.len() - 1
    }

    /// Path length of `point`: depth of the reached leaf plus `c(size)` for
    /// leaves that still hold several training points.
    pub fn path_length(&self, point: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Internal {
                    feature,
                    split,
                    left,
                    right,
                }) => {
                    let value = point.get(*feature).copied().unwrap_or(0.0);
                    index = if value < *split { *left } else { *right };
                }
                Some(Node::Leaf { depth, size }) => {
                    return *depth as f64 + average_path_length(*size);
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Deepest leaf depth actually reached.
    pub fn depth(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Leaf { depth, .. } => Some(*depth),
                Node::Internal { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn average_path_length_known_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ≈ 10.24
        assert!((average_path_length(256) - 10.244).abs() < 0.01);
    }

    #[test]
    fn depth_never_exceeds_limit() {
        // One constant feature and one exponentially spread feature: without
        // the limit, splits would keep peeling single points off the tail
        let data: Vec<Vec<f64>> = (0..256).map(|i| vec![0.0, 2f64.powi(i % 60)]).collect();
        let mut idx: Vec<usize> = (0..data.len()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let tree = IsolationTree::build(&data, &mut idx, 8, &mut rng);
        assert!(tree.depth() <= 8);
    }

    #[test]
    fn constant_subsample_is_a_single_leaf() {
        let data = vec![vec![1.0, 2.0]; 16];
        let mut idx: Vec<usize> = (0..16).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let tree = IsolationTree::build(&data, &mut idx, 4, &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert!((tree.path_length(&[1.0, 2.0]) - average_path_length(16)).abs() < 1e-12);
    }

    #[test]
    fn partition_keeps_every_point_and_the_max_on_the_right() {
        let mut rng = StdRng::seed_from_u64(11);
        let data: Vec<Vec<f64>> = (0..64).map(|i| vec![(i % 8) as f64, (i / 8) as f64]).collect();
        for _ in 0..20 {
            let mut idx: Vec<usize> = (0..data.len()).collect();
            let tree = IsolationTree::build(&data, &mut idx, 6, &mut rng);
            let leaf_total: usize = tree
                .nodes
                .iter()
                .filter_map(|n| match n {
                    Node::Leaf { size, .. } => Some(*size),
                    Node::Internal { .. } => None,
                })
                .sum();
            assert_eq!(leaf_total, data.len());
            if let Node::Internal { right, .. } = &tree.nodes[0] {
                assert!(tree.nodes.len() > *right);
                assert!(!matches!(tree.nodes[*right], Node::Leaf { size: 0, .. }));
            }
        }
    }

    #[test]
    fn outlier_isolates_faster_than_inlier() {
        let mut rng = StdRng::seed_from_u64(3);
        let data: Vec<Vec<f64>> = (0..128).map(|_| vec![rng.gen_range(-1.0..1.0)]).collect();
        let mut total_in = 0.0;
        let mut total_out = 0.0;
        for _ in 0..50 {
            let mut idx: Vec<usize> = (0..data.len()).collect();
            let tree = IsolationTree::build(&data, &mut idx, 7, &mut rng);
            total_in += tree.path_length(&[0.0]);
            total_out += tree.path_length(&[25.0]);
        }
        assert!(total_out < total_in);
    }
}
