//! Ball tree neighbor search.
//!
//! Space-partitioning tree using hyperspheres (balls) instead of hyperplanes.
//! Each node stores a center and a radius covering every row below it, so a
//! whole subtree can be skipped once the current k-th best distance is
//! smaller than the distance to its ball.
//!
//! Pruning relies on the triangle inequality, so the tree is Euclidean only.
//! Results are exact and match [`super::FlatIndex`] with
//! [`DistanceMetric::L2`], including the position tie-break.
//!
//! # References
//!
//! - Omohundro (1989): "Five balltree construction algorithms"

use serde::{Deserialize, Serialize};

use super::{rank, ModelStats, Neighbor, NeighborModel};
use crate::distance::DistanceMetric;
use crate::error::{RecommendError, Result};
use crate::pivot::PivotIndex;
use crate::simd;

const PRUNE_SLACK: f32 = 1e-4;

/// Ball tree index over pivot rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BallTreeParts")]
pub struct BallTreeIndex {
    vectors: Vec<f32>,
    dimension: usize,
    num_rows: usize,
    params: BallTreeParams,
    root: BallNode,
}

/// Ball tree parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallTreeParams {
    /// Maximum leaf size
    pub max_leaf_size: usize,

    /// Maximum depth
    pub max_depth: usize,
}

impl Default for BallTreeParams {
    fn default() -> Self {
        Self {
            max_leaf_size: 16,
            max_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum BallNode {
    Internal {
        center: Vec<f32>,
        radius: f32,
        left: Box<BallNode>,
        right: Box<BallNode>,
    },
    Leaf {
        positions: Vec<u32>,
        center: Vec<f32>,
        radius: f32,
    },
}

/// Stored layout of [`BallTreeIndex`], checked before use.
#[derive(Deserialize)]
struct BallTreeParts {
    vectors: Vec<f32>,
    dimension: usize,
    num_rows: usize,
    params: BallTreeParams,
    root: BallNode,
}

impl TryFrom<BallTreeParts> for BallTreeIndex {
    type Error = RecommendError;

    fn try_from(parts: BallTreeParts) -> Result<Self> {
        if parts.dimension == 0 {
            return Err(RecommendError::InvalidParameter(
                "dimension must be greater than 0".to_string(),
            ));
        }
        if parts.num_rows.checked_mul(parts.dimension) != Some(parts.vectors.len()) {
            return Err(RecommendError::InvalidParameter(format!(
                "ball tree holds {} values, expected {} rows of {}",
                parts.vectors.len(),
                parts.num_rows,
                parts.dimension
            )));
        }
        parts.root.check(parts.num_rows, parts.dimension)?;
        Ok(Self {
            vectors: parts.vectors,
            dimension: parts.dimension,
            num_rows: parts.num_rows,
            params: parts.params,
            root: parts.root,
        })
    }
}

impl BallNode {
    /// Every center has the row dimension and every leaf position addresses a row.
    fn check(&self, num_rows: usize, dimension: usize) -> Result<()> {
        let (center, _) = self.ball();
        if center.len() != dimension {
            return Err(RecommendError::DimensionMismatch {
                query_dim: center.len(),
                model_dim: dimension,
            });
        }
        match self {
            BallNode::Leaf { positions, .. } => {
                match positions.iter().find(|&&p| p as usize >= num_rows) {
                    Some(&p) => Err(RecommendError::PositionOutOfRange {
                        position: p as usize,
                        len: num_rows,
                    }),
                    None => Ok(()),
                }
            }
            BallNode::Internal { left, right, .. } => {
                left.check(num_rows, dimension)?;
                right.check(num_rows, dimension)
            }
        }
    }

    fn ball(&self) -> (&[f32], f32) {
        match self {
            BallNode::Internal { center, radius, .. } | BallNode::Leaf { center, radius, .. } => {
                (center.as_slice(), *radius)
            }
        }
    }
}

/// Search state: the current best `k` and the pruning bound.
struct Frontier {
    k: usize,
    best: Vec<Neighbor>,
    /// Worst kept distance once `best` is full, else infinity.
    bound: f32,
}

impl Frontier {
    fn offer(&mut self, candidate: Neighbor) {
        if self.best.len() < self.k {
            self.best.push(candidate);
            if self.best.len() == self.k {
                self.refresh_bound();
            }
            return;
        }
        let worst = self
            .best
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.distance
                    .total_cmp(&b.distance)
                    .then(a.position.cmp(&b.position))
            })
            .map(|(i, n)| (i, *n));
        if let Some((i, worst)) = worst {
            let better = candidate
                .distance
                .total_cmp(&worst.distance)
                .then(candidate.position.cmp(&worst.position))
                .is_lt();
            if better {
                self.best[i] = candidate;
                self.refresh_bound();
            }
        }
    }

    fn refresh_bound(&mut self) {
        self.bound = self
            .best
            .iter()
            .map(|n| n.distance)
            .fold(f32::NEG_INFINITY, f32::max);
    }

    /// A ball whose closest possible point is farther than the bound holds nothing useful.
    ///
    /// The slack keeps rows tied with the bound reachable despite rounding in
    /// `dist(query, center) - radius`; ties are decided by position.
    fn can_skip(&self, min_possible: f32) -> bool {
        min_possible > self.bound + PRUNE_SLACK * (1.0 + self.bound)
    }
}

impl BallTreeIndex {
    /// Fit over every row of `pivot`, preserving row order.
    pub fn fit(pivot: &PivotIndex, params: BallTreeParams) -> Result<Self> {
        if pivot.num_users() == 0 {
            return Err(RecommendError::InvalidParameter(
                "dimension must be greater than 0".to_string(),
            ));
        }
        if pivot.num_titles() == 0 {
            return Err(RecommendError::EmptyIndex);
        }
        if pivot.num_titles() > u32::MAX as usize {
            return Err(RecommendError::InvalidParameter(
                "ball tree supports at most u32::MAX rows".to_string(),
            ));
        }
        if params.max_leaf_size == 0 {
            return Err(RecommendError::InvalidParameter(
                "max_leaf_size must be greater than 0".to_string(),
            ));
        }

        let mut vectors = Vec::with_capacity(pivot.num_titles() * pivot.num_users());
        for row in pivot.rows() {
            vectors.extend_from_slice(row);
        }

        let mut tree = Self {
            vectors,
            dimension: pivot.num_users(),
            num_rows: pivot.num_titles(),
            params,
            root: BallNode::Leaf {
                positions: Vec::new(),
                center: Vec::new(),
                radius: 0.0,
            },
        };
        let positions: Vec<u32> = (0..tree.num_rows as u32).collect();
        tree.root = tree.build_tree(positions, 0);
        Ok(tree)
    }

    pub fn params(&self) -> BallTreeParams {
        self.params
    }

    fn build_tree(&self, positions: Vec<u32>, depth: usize) -> BallNode {
        let center = self.compute_center(&positions);
        let radius = self.compute_radius(&positions, &center);

        if positions.len() <= self.params.max_leaf_size || depth >= self.params.max_depth {
            return BallNode::Leaf {
                positions,
                center,
                radius,
            };
        }

        // Seeds: the row farthest from the center, then the row farthest from it.
        let seed1 = self.farthest_from(&positions, &center);
        let seed2 = self.farthest_from(&positions, self.row(seed1 as usize));
        let (s1, s2) = (self.row(seed1 as usize), self.row(seed2 as usize));

        let (left, right): (Vec<u32>, Vec<u32>) = positions.iter().partition(|&&p| {
            let row = self.row(p as usize);
            simd::l2_distance_squared(row, s1) < simd::l2_distance_squared(row, s2)
        });

        // All rows identical (or equidistant): splitting cannot make progress.
        if left.is_empty() || right.is_empty() {
            return BallNode::Leaf {
                positions,
                center,
                radius,
            };
        }

        BallNode::Internal {
            center,
            radius,
            left: Box::new(self.build_tree(left, depth + 1)),
            right: Box::new(self.build_tree(right, depth + 1)),
        }
    }

    fn compute_center(&self, positions: &[u32]) -> Vec<f32> {
        let mut center = vec![0.0f32; self.dimension];
        for &p in positions {
            for (c, &v) in center.iter_mut().zip(self.row(p as usize)) {
                *c += v;
            }
        }
        let count = positions.len().max(1) as f32;
        for c in center.iter_mut() {
            *c /= count;
        }
        center
    }

    fn compute_radius(&self, positions: &[u32], center: &[f32]) -> f32 {
        positions
            .iter()
            .map(|&p| simd::l2_distance(self.row(p as usize), center))
            .fold(0.0f32, f32::max)
    }

    fn farthest_from(&self, positions: &[u32], point: &[f32]) -> u32 {
        let mut best = (positions[0], f32::NEG_INFINITY);
        for &p in positions {
            let d = simd::l2_distance_squared(self.row(p as usize), point);
            if d > best.1 {
                best = (p, d);
            }
        }
        best.0
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    fn min_possible(query: &[f32], node: &BallNode) -> f32 {
        let (center, radius) = node.ball();
        (simd::l2_distance(query, center) - radius).max(0.0)
    }

    fn search_node(&self, node: &BallNode, query: &[f32], frontier: &mut Frontier) {
        if frontier.can_skip(Self::min_possible(query, node)) {
            return;
        }
        match node {
            BallNode::Leaf { positions, .. } => {
                for &p in positions {
                    frontier.offer(Neighbor {
                        position: p as usize,
                        distance: simd::l2_distance(query, self.row(p as usize)),
                    });
                }
            }
            BallNode::Internal { left, right, .. } => {
                // Visit the closer ball first so the bound tightens early.
                let left_min = Self::min_possible(query, left);
                let right_min = Self::min_possible(query, right);
                if left_min <= right_min {
                    self.search_node(left, query, frontier);
                    self.search_node(right, query, frontier);
                } else {
                    self.search_node(right, query, frontier);
                    self.search_node(left, query, frontier);
                }
            }
        }
    }
}

impl NeighborModel for BallTreeIndex {
    fn kneighbors(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(RecommendError::InvalidParameter(
                "k must be greater than 0".to_string(),
            ));
        }
        if query.len() != self.dimension {
            return Err(RecommendError::DimensionMismatch {
                query_dim: query.len(),
                model_dim: self.dimension,
            });
        }

        let mut frontier = Frontier {
            k,
            best: Vec::with_capacity(k),
            bound: f32::INFINITY,
        };
        self.search_node(&self.root, query, &mut frontier);

        let mut results = frontier.best;
        rank(&mut results, k);
        Ok(results)
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn stats(&self) -> ModelStats {
        ModelStats {
            num_rows: self.num_rows,
            dimension: self.dimension,
            size_bytes: self.vectors.len() * std::mem::size_of::<f32>(),
            algorithm: "ball_tree",
            metric: DistanceMetric::L2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbors::FlatIndex;

    fn grid_pivot(n: usize, dim: usize) -> PivotIndex {
        let rows = (0..n)
            .map(|i| {
                let row = (0..dim)
                    .map(|d| (((i * 7 + d * 13) % 11) as f32) * 0.5)
                    .collect();
                (format!("title-{i}"), row)
            })
            .collect();
        PivotIndex::from_rows((0..dim as u32).collect(), rows).expect("pivot")
    }

    #[test]
    fn matches_brute_force() {
        let pivot = grid_pivot(200, 8);
        let params = BallTreeParams {
            max_leaf_size: 4,
            max_depth: 32,
        };
        let tree = BallTreeIndex::fit(&pivot, params).expect("fit");
        let flat = FlatIndex::fit(&pivot, DistanceMetric::L2).expect("fit");

        for position in [0, 17, 99, 199] {
            let row = pivot.row_at(position).expect("row");
            let a = tree.kneighbors(row, 6).expect("tree search");
            let b = flat.kneighbors(row, 6).expect("flat search");
            assert_eq!(a, b, "mismatch for row {position}");
        }
    }

    #[test]
    fn identical_rows_collapse_into_one_leaf() {
        let rows = (0..40)
            .map(|i| (format!("t{i}"), vec![1.0, 2.0, 3.0]))
            .collect();
        let pivot = PivotIndex::from_rows(vec![1, 2, 3], rows).expect("pivot");
        let tree = BallTreeIndex::fit(&pivot, BallTreeParams::default()).expect("fit");
        let result = tree.kneighbors(&[1.0, 2.0, 3.0], 6).expect("search");
        let positions: Vec<usize> = result.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejects_empty_and_bad_params() {
        let empty = PivotIndex::new(Vec::new(), vec![1], Vec::new()).expect("pivot");
        assert_eq!(
            BallTreeIndex::fit(&empty, BallTreeParams::default()).unwrap_err(),
            RecommendError::EmptyIndex
        );
        let pivot = grid_pivot(3, 2);
        let params = BallTreeParams {
            max_leaf_size: 0,
            max_depth: 4,
        };
        assert!(BallTreeIndex::fit(&pivot, params).is_err());
    }

    #[test]
    fn deserialize_rejects_out_of_range_positions() {
        let tree = BallTreeIndex::fit(&grid_pivot(5, 3), BallTreeParams::default()).expect("fit");
        let good = serde_json::to_value(&tree).expect("serialize");
        let back: BallTreeIndex = serde_json::from_value(good.clone()).expect("deserialize");
        assert_eq!(back.num_rows(), 5);

        let mut bad = good.clone();
        bad["root"]["Leaf"]["positions"][0] = serde_json::json!(99);
        assert!(serde_json::from_value::<BallTreeIndex>(bad).is_err());

        let mut short = good;
        short["num_rows"] = serde_json::json!(6);
        assert!(serde_json::from_value::<BallTreeIndex>(short).is_err());
    }
}
