//! Neighbor models fitted over pivot index rows.
//!
//! A neighbor model answers one question: given a rating row, which rows of
//! the training matrix are closest, and how far are they? Results are row
//! positions into the pivot index the model was fitted on, ordered by
//! ascending distance.
//!
//! Two exact implementations are provided:
//!
//! - [`FlatIndex`]: brute-force scan, any [`DistanceMetric`]. The default.
//! - [`BallTreeIndex`]: ball tree with radius pruning, Euclidean only.
//!   Worth it when the catalog has many thousands of titles.
//!
//! Both are wrapped by [`FittedModel`], the serializable form stored in the
//! model artifact.

mod balltree;
mod flat;

pub use balltree::{BallTreeIndex, BallTreeParams};
pub use flat::FlatIndex;

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::pivot::PivotIndex;

/// One neighbor: a pivot row position and its distance from the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Statistics about a fitted model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStats {
    pub num_rows: usize,
    pub dimension: usize,
    pub size_bytes: usize,
    pub algorithm: &'static str,
    pub metric: DistanceMetric,
}

/// Nearest-neighbor search over a fixed set of rows.
pub trait NeighborModel {
    /// Up to `k` nearest rows to `query`, closest first.
    ///
    /// Returns fewer than `k` neighbors only when the model has fewer than
    /// `k` rows.
    fn kneighbors(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Neighbors of a row the model was fitted on, `position` itself first.
    ///
    /// A row is never farther from itself than from any other row, but ties
    /// and rounding can rank it lower or push it out of the top `k`: an
    /// identical rating row, or an all-zero row under cosine distance. The
    /// row is moved (or inserted) at the front with a distance no larger than
    /// the best match, and the list is cut back to `k`.
    fn kneighbors_of_row(&self, position: usize, row: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let mut neighbors = self.kneighbors(row, k)?;
        put_self_first(&mut neighbors, position, k);
        Ok(neighbors)
    }

    /// Number of rows the model was fitted on.
    fn num_rows(&self) -> usize;

    /// Length of the rows the model accepts.
    fn dimension(&self) -> usize;

    fn stats(&self) -> ModelStats;
}

fn put_self_first(neighbors: &mut Vec<Neighbor>, position: usize, k: usize) {
    let Some(best) = neighbors.first().map(|n| n.distance) else {
        return;
    };
    match neighbors.iter().position(|n| n.position == position) {
        Some(i) => {
            neighbors[i].distance = neighbors[i].distance.min(best);
            neighbors[..=i].rotate_right(1);
        }
        None => {
            neighbors.insert(
                0,
                Neighbor {
                    position,
                    distance: best,
                },
            );
            neighbors.truncate(k);
        }
    }
}

/// The persisted neighbor model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    Flat(FlatIndex),
    BallTree(BallTreeIndex),
}

impl FittedModel {
    /// Fit a brute-force model over every row of `pivot`.
    pub fn fit_flat(pivot: &PivotIndex, metric: DistanceMetric) -> Result<Self> {
        FlatIndex::fit(pivot, metric).map(FittedModel::Flat)
    }

    /// Fit a Euclidean ball tree over every row of `pivot`.
    pub fn fit_ball_tree(pivot: &PivotIndex, params: BallTreeParams) -> Result<Self> {
        BallTreeIndex::fit(pivot, params).map(FittedModel::BallTree)
    }

    fn inner(&self) -> &dyn NeighborModel {
        match self {
            FittedModel::Flat(index) => index,
            FittedModel::BallTree(index) => index,
        }
    }
}

impl NeighborModel for FittedModel {
    fn kneighbors(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.inner().kneighbors(query, k)
    }

    fn num_rows(&self) -> usize {
        self.inner().num_rows()
    }

    fn dimension(&self) -> usize {
        self.inner().dimension()
    }

    fn stats(&self) -> ModelStats {
        self.inner().stats()
    }
}

/// Rank `(position, distance)` candidates: ascending distance, then position.
pub(crate) fn rank(candidates: &mut Vec<Neighbor>, k: usize) {
    let by_distance = |a: &Neighbor, b: &Neighbor| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.position.cmp(&b.position))
    };
    if k < candidates.len() {
        if k > 0 {
            candidates.select_nth_unstable_by(k - 1, by_distance);
        }
        candidates.truncate(k);
    }
    candidates.sort_by(by_distance);
}
