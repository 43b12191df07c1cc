//! Error types for shelfwise queries.

use thiserror::Error;

/// Errors that can occur while building the in-memory structures or answering a query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecommendError {
    /// Title is not a row of the pivot index (exact match).
    #[error("title not found: {0:?}")]
    TitleNotFound(String),

    /// A neighbor resolved to a title with no metadata record.
    ///
    /// The pivot index and metadata table were not produced from the same
    /// training run.
    #[error("no metadata record for title {title:?}")]
    MetadataJoin { title: String },

    /// A neighbor position does not address a pivot row.
    #[error("neighbor position {position} out of range for {len} rows")]
    PositionOutOfRange { position: usize, len: usize },

    /// Dimension mismatch between query and model.
    #[error("dimension mismatch: query has {query_dim} dimensions, model has {model_dim}")]
    DimensionMismatch { query_dim: usize, model_dim: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Model was fitted over zero rows.
    #[error("index is empty")]
    EmptyIndex,
}

pub type Result<T> = std::result::Result<T, RecommendError>;
