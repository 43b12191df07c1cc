//! Pivot index: the title × user rating matrix.
//!
//! Rows are unique titles in training order, columns are users. Values are
//! stored row-major in one flat buffer so a row is a contiguous slice that
//! can be handed straight to a neighbor model.
//!
//! The row order is the contract every other structure relies on: a
//! neighbor model fitted over this matrix reports neighbors as row
//! positions, and [`PivotIndex::title_at`] turns them back into titles.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{RecommendError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PivotParts {
    titles: Vec<String>,
    user_ids: Vec<u32>,
    values: Vec<f32>,
}

/// Dense title × user rating matrix with an ordered, unique title axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PivotParts", into = "PivotParts")]
pub struct PivotIndex {
    titles: Vec<String>,
    user_ids: Vec<u32>,
    /// Row-major, `titles.len() * user_ids.len()` values.
    values: Vec<f32>,
    positions: HashMap<String, usize>,
}

impl PivotIndex {
    /// Build a pivot index from its title axis, user axis and row-major values.
    ///
    /// Fails if a title repeats, a user id repeats, or `values` does not have
    /// exactly one cell per (title, user) pair.
    pub fn new(titles: Vec<String>, user_ids: Vec<u32>, values: Vec<f32>) -> Result<Self> {
        let expected = titles.len().checked_mul(user_ids.len()).ok_or_else(|| {
            RecommendError::InvalidParameter("pivot shape overflows usize".to_string())
        })?;
        if values.len() != expected {
            return Err(RecommendError::InvalidParameter(format!(
                "pivot has {} cells, expected {} titles x {} users = {expected}",
                values.len(),
                titles.len(),
                user_ids.len(),
            )));
        }

        let mut positions = HashMap::with_capacity(titles.len());
        for (position, title) in titles.iter().enumerate() {
            if positions.insert(title.clone(), position).is_some() {
                return Err(RecommendError::InvalidParameter(format!(
                    "duplicate pivot title {title:?}"
                )));
            }
        }

        let mut seen_users = HashSet::with_capacity(user_ids.len());
        if let Some(dup) = user_ids.iter().find(|id| !seen_users.insert(**id)) {
            return Err(RecommendError::InvalidParameter(format!(
                "duplicate pivot user id {dup}"
            )));
        }

        Ok(Self {
            titles,
            user_ids,
            values,
            positions,
        })
    }

    /// Build from one dense row per title.
    pub fn from_rows(user_ids: Vec<u32>, rows: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let mut titles = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len() * user_ids.len());
        for (title, row) in rows {
            if row.len() != user_ids.len() {
                return Err(RecommendError::DimensionMismatch {
                    query_dim: row.len(),
                    model_dim: user_ids.len(),
                });
            }
            titles.push(title);
            values.extend_from_slice(&row);
        }
        Self::new(titles, user_ids, values)
    }

    /// Row position of `title`. Exact string match, no normalization.
    pub fn position_of(&self, title: &str) -> Result<usize> {
        self.positions
            .get(title)
            .copied()
            .ok_or_else(|| RecommendError::TitleNotFound(title.to_string()))
    }

    /// Dense rating row at `position`.
    pub fn row_at(&self, position: usize) -> Option<&[f32]> {
        if position >= self.titles.len() {
            return None;
        }
        let dim = self.user_ids.len();
        let start = position * dim;
        Some(&self.values[start..start + dim])
    }

    /// Title at `position`; inverse of [`PivotIndex::position_of`].
    pub fn title_at(&self, position: usize) -> Option<&str> {
        self.titles.get(position).map(String::as_str)
    }

    /// Titles in row order.
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    /// User ids in column order.
    pub fn user_ids(&self) -> &[u32] {
        &self.user_ids
    }

    pub fn num_titles(&self) -> usize {
        self.titles.len()
    }

    pub fn num_users(&self) -> usize {
        self.user_ids.len()
    }

    /// Iterate rows in position order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.titles.len()).filter_map(move |position| self.row_at(position))
    }
}

impl TryFrom<PivotParts> for PivotIndex {
    type Error = RecommendError;

    fn try_from(parts: PivotParts) -> Result<Self> {
        Self::new(parts.titles, parts.user_ids, parts.values)
    }
}

impl From<PivotIndex> for PivotParts {
    fn from(pivot: PivotIndex) -> Self {
        PivotParts {
            titles: pivot.titles,
            user_ids: pivot.user_ids,
            values: pivot.values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PivotIndex {
        PivotIndex::from_rows(
            vec![11, 22, 33],
            vec![
                ("1984".to_string(), vec![10.0, 0.0, 7.0]),
                ("Animal Farm".to_string(), vec![9.0, 0.0, 0.0]),
                ("Emma".to_string(), vec![0.0, 5.0, 0.0]),
            ],
        )
        .expect("valid pivot")
    }

    #[test]
    fn position_and_title_are_inverse() {
        let pivot = sample();
        for (i, title) in pivot.titles().iter().enumerate() {
            assert_eq!(pivot.position_of(title), Ok(i));
            assert_eq!(pivot.title_at(i), Some(title.as_str()));
        }
        assert_eq!(pivot.title_at(3), None);
    }

    #[test]
    fn position_of_is_exact_match() {
        let pivot = sample();
        assert_eq!(
            pivot.position_of("emma"),
            Err(RecommendError::TitleNotFound("emma".to_string()))
        );
        assert!(pivot.position_of(" Emma").is_err());
    }

    #[test]
    fn row_at_returns_dense_row() {
        let pivot = sample();
        assert_eq!(pivot.row_at(1), Some(&[9.0, 0.0, 0.0][..]));
        assert_eq!(pivot.row_at(3), None);
        assert_eq!(pivot.rows().count(), 3);
        assert_eq!(pivot.num_users(), 3);
    }

    #[test]
    fn rejects_duplicate_titles() {
        let err = PivotIndex::new(
            vec!["a".to_string(), "a".to_string()],
            vec![1],
            vec![1.0, 2.0],
        )
        .unwrap_err();
        assert!(matches!(err, RecommendError::InvalidParameter(_)));
    }

    #[test]
    fn rejects_duplicate_users_and_bad_shape() {
        assert!(PivotIndex::new(vec!["a".to_string()], vec![1, 1], vec![1.0, 2.0]).is_err());
        assert!(PivotIndex::new(vec!["a".to_string()], vec![1, 2], vec![1.0]).is_err());
        assert!(matches!(
            PivotIndex::from_rows(vec![1, 2], vec![("a".to_string(), vec![1.0])]),
            Err(RecommendError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn deserialization_rebuilds_positions() {
        let pivot = sample();
        let json = serde_json::to_string(&pivot).expect("serialize");
        let back: PivotIndex = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.position_of("Emma"), Ok(2));
        assert_eq!(back.row_at(0), pivot.row_at(0));
    }
}
