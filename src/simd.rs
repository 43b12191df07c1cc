//! Dense vector kernels used by the neighbor models.
//!
//! With the `innr` feature (default) these are the `innr` crate's runtime
//! dispatched SIMD kernels. Without it, portable loops are used instead.
//!
//! ```rust
//! use shelfwise::simd::{cosine, dot, norm};
//!
//! let a = [1.0_f32, 0.0, 0.0];
//! let b = [0.707, 0.707, 0.0];
//!
//! let d = dot(&a, &b);
//! let c = cosine(&a, &b);
//! let n = norm(&a);
//! assert!((d - c).abs() < 1e-6);
//! assert!((n - 1.0).abs() < 1e-6);
//! ```
//!
//! Callers check lengths first: `innr` asserts equal lengths in debug builds.

#[cfg(feature = "innr")]
pub use innr::{cosine, dot, l2_distance, l2_distance_squared, norm};

#[cfg(not(feature = "innr"))]
mod fallback {
    //! Portable kernels for builds without `innr`.

    const NORM_EPSILON: f32 = 1e-9;

    /// Dot product of two vectors.
    #[inline]
    #[must_use]
    pub fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    /// L2 norm of a vector.
    #[inline]
    #[must_use]
    pub fn norm(v: &[f32]) -> f32 {
        dot(v, v).sqrt()
    }

    /// Cosine similarity. Returns 0 when either vector has (near) zero norm.
    #[inline]
    #[must_use]
    pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let d = dot(a, b);
        let na = norm(a);
        let nb = norm(b);
        if na > NORM_EPSILON && nb > NORM_EPSILON {
            d / (na * nb)
        } else {
            0.0
        }
    }

    /// Euclidean distance.
    #[inline]
    #[must_use]
    pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
        l2_distance_squared(a, b).sqrt()
    }

    /// Squared Euclidean distance (cheaper when only ranking).
    #[inline]
    #[must_use]
    pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }
}

#[cfg(not(feature = "innr"))]
pub use fallback::{cosine, dot, l2_distance, l2_distance_squared, norm};
