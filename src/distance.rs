//! Distance metrics for rating rows.
//!
//! Neighbor models are fitted with one of these metrics and persist it, so a
//! loaded model always ranks with the metric it was trained with.
//!
//! ## Important nuance
//!
//! [`cosine_distance`] computes norms on every call. Rating rows are not
//! normalized (a 10-star rating and a 1-star rating have different lengths),
//! so there is no normalized shortcut here.

use serde::{Deserialize, Serialize};

use crate::simd;

/// Distance metric for dense rating rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance.
    #[default]
    L2,
    /// Cosine distance $1 - \cos(a,b)$.
    Cosine,
}

impl DistanceMetric {
    /// Compute distance between two vectors.
    ///
    /// If dimensions mismatch, this returns `f32::INFINITY` (so it is never selected as a
    /// nearest neighbor).
    #[inline]
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => l2_distance(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }

    /// Short lowercase name, used in logs and stats.
    pub fn name(self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

/// L2 (Euclidean) distance.
#[inline]
#[must_use]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    simd::l2_distance(a, b)
}

/// Cosine distance $1 - \cos(a,b)$, in `[0, 2]`.
///
/// A zero row has cosine similarity 0 with everything, so its distance is 1.
#[inline]
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    1.0 - simd::cosine(a, b).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_is_zero_for_identical() {
        let a = [1.0_f32, 2.0, 3.0];
        let d = cosine_distance(&a, &a);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_ignores_scale() {
        let a = [3.0_f32, 4.0, 0.0];
        let b = [6.0_f32, 8.0, 0.0];
        assert!(cosine_distance(&a, &b).abs() < 1e-6);
        assert!(l2_distance(&a, &b) > 4.9);
    }

    #[test]
    fn mismatched_dimensions_are_infinitely_far() {
        let a = [1.0_f32, 2.0];
        let b = [1.0_f32, 2.0, 3.0];
        assert_eq!(DistanceMetric::L2.distance(&a, &b), f32::INFINITY);
        assert_eq!(DistanceMetric::Cosine.distance(&a, &b), f32::INFINITY);
    }

    #[test]
    fn default_metric_is_euclidean() {
        assert_eq!(DistanceMetric::default(), DistanceMetric::L2);
        assert_eq!(DistanceMetric::default().name(), "l2");
    }
}
