//! Exact brute-force neighbor search.

use serde::{Deserialize, Serialize};

use super::{rank, ModelStats, Neighbor, NeighborModel};
use crate::distance::DistanceMetric;
use crate::error::{RecommendError, Result};
use crate::pivot::PivotIndex;

/// Brute-force index: every query is compared against every row.
///
/// Ties are broken by row position, so results are fully deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "FlatParts")]
pub struct FlatIndex {
    /// Row-major training rows.
    vectors: Vec<f32>,
    dimension: usize,
    num_rows: usize,
    metric: DistanceMetric,
}

/// Stored layout of [`FlatIndex`], checked before use.
#[derive(Deserialize)]
struct FlatParts {
    vectors: Vec<f32>,
    dimension: usize,
    num_rows: usize,
    metric: DistanceMetric,
}

impl TryFrom<FlatParts> for FlatIndex {
    type Error = RecommendError;

    fn try_from(parts: FlatParts) -> Result<Self> {
        if parts.dimension == 0 {
            return Err(RecommendError::InvalidParameter(
                "dimension must be greater than 0".to_string(),
            ));
        }
        let expected = parts.num_rows.checked_mul(parts.dimension);
        if expected != Some(parts.vectors.len()) {
            return Err(RecommendError::InvalidParameter(format!(
                "flat index holds {} values, expected {} rows of {}",
                parts.vectors.len(),
                parts.num_rows,
                parts.dimension
            )));
        }
        Ok(Self {
            vectors: parts.vectors,
            dimension: parts.dimension,
            num_rows: parts.num_rows,
            metric: parts.metric,
        })
    }
}

impl FlatIndex {
    /// Create an empty index for rows of length `dimension`.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Result<Self> {
        if dimension == 0 {
            return Err(RecommendError::InvalidParameter(
                "dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            vectors: Vec::new(),
            dimension,
            num_rows: 0,
            metric,
        })
    }

    /// Fit over every row of `pivot`, preserving row order.
    pub fn fit(pivot: &PivotIndex, metric: DistanceMetric) -> Result<Self> {
        let mut index = Self::new(pivot.num_users(), metric)?;
        index.vectors.reserve(pivot.num_titles() * pivot.num_users());
        for row in pivot.rows() {
            index.add(row)?;
        }
        Ok(index)
    }

    /// Append a row; it gets the next position.
    pub fn add(&mut self, row: &[f32]) -> Result<()> {
        if row.len() != self.dimension {
            return Err(RecommendError::DimensionMismatch {
                query_dim: row.len(),
                model_dim: self.dimension,
            });
        }
        self.vectors.extend_from_slice(row);
        self.num_rows += 1;
        Ok(())
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.vectors[start..start + self.dimension]
    }
}

impl NeighborModel for FlatIndex {
    fn kneighbors(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(RecommendError::InvalidParameter(
                "k must be greater than 0".to_string(),
            ));
        }
        if self.num_rows == 0 {
            return Err(RecommendError::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(RecommendError::DimensionMismatch {
                query_dim: query.len(),
                model_dim: self.dimension,
            });
        }

        let mut candidates: Vec<Neighbor> = (0..self.num_rows)
            .map(|position| Neighbor {
                position,
                distance: self.metric.distance(query, self.row(position)),
            })
            .collect();
        rank(&mut candidates, k);
        Ok(candidates)
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
            algorithm: "flat",
            metric: self.metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(metric: DistanceMetric) -> FlatIndex {
        let mut index = FlatIndex::new(2, metric).expect("create");
        for row in [[0.0, 0.0], [1.0, 0.0], [0.0, 3.0], [5.0, 5.0]] {
            index.add(&row).expect("add");
        }
        index
    }

    #[test]
    fn finds_exact_neighbors_in_order() {
        let index = index(DistanceMetric::L2);
        let result = index.kneighbors(&[0.0, 0.0], 3).expect("search");
        let positions: Vec<usize> = result.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(result[0].distance, 0.0);
        assert!((result[2].distance - 3.0).abs() < 1e-6);
    }

    #[test]
    fn returns_all_rows_when_k_exceeds_size() {
        let index = index(DistanceMetric::L2);
        assert_eq!(index.kneighbors(&[1.0, 1.0], 10).expect("search").len(), 4);
    }

    #[test]
    fn cosine_ranks_by_direction() {
        let index = index(DistanceMetric::Cosine);
        let result = index.kneighbors(&[2.0, 2.0], 1).expect("search");
        assert_eq!(result[0].position, 3);
    }

    #[test]
    fn rejects_bad_queries() {
        let index = index(DistanceMetric::L2);
        assert!(matches!(
            index.kneighbors(&[1.0], 2),
            Err(RecommendError::DimensionMismatch { query_dim: 1, model_dim: 2 })
        ));
        assert!(index.kneighbors(&[1.0, 1.0], 0).is_err());

        let empty = FlatIndex::new(2, DistanceMetric::L2).expect("create");
        assert_eq!(empty.kneighbors(&[0.0, 0.0], 1), Err(RecommendError::EmptyIndex));
        assert!(FlatIndex::new(0, DistanceMetric::L2).is_err());
    }

    #[test]
    fn fit_preserves_pivot_order() {
        let pivot = PivotIndex::from_rows(
            vec![1, 2],
            vec![
                ("a".to_string(), vec![1.0, 0.0]),
                ("b".to_string(), vec![0.0, 1.0]),
            ],
        )
        .expect("pivot");
        let index = FlatIndex::fit(&pivot, DistanceMetric::L2).expect("fit");
        assert_eq!(index.num_rows(), 2);
        assert_eq!(index.kneighbors(&[0.0, 1.0], 1).expect("search")[0].position, 1);
        assert_eq!(index.stats().algorithm, "flat");
    }

    #[test]
    fn deserialize_rejects_truncated_rows() {
        let mut value = serde_json::to_value(index(DistanceMetric::L2)).expect("serialize");
        value["num_rows"] = serde_json::json!(5);
        assert!(serde_json::from_value::<FlatIndex>(value.clone()).is_err());

        value["num_rows"] = serde_json::json!(4);
        value["dimension"] = serde_json::json!(0);
        assert!(serde_json::from_value::<FlatIndex>(value).is_err());
    }

    #[test]
    fn deserialize_accepts_consistent_index() {
        let value = serde_json::to_value(index(DistanceMetric::Cosine)).expect("serialize");
        let back: FlatIndex = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back.num_rows(), 4);
        assert_eq!(back.metric(), DistanceMetric::Cosine);
    }
}
