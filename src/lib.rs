//! shelfwise: book recommendations from a fitted nearest-neighbor model.
//!
//! The offline training run pivots the rating events into a title × user
//! matrix, fits a neighbor model over its rows, and stores four artifacts.
//! This crate loads them once and answers two read-only queries:
//!
//! - [`Engine::recommend`]: the titles whose rating rows are closest to the
//!   given title's row, with cover, author, year, ISBN and publisher.
//! - [`Engine::top_rated`]: the highest-rated books, for a landing page.
//!
//! Layout:
//!
//! - `metadata`: per-rating-event display records, first-match title lookup
//! - `pivot`: the rating matrix and its title ↔ row bijection
//! - `neighbors`: the [`NeighborModel`] trait, brute force and ball tree
//! - `engine`: [`Catalog`], [`Engine`], [`Recommendation`]
//! - `persistence`: the artifact directory format
//! - `config`: [`EngineConfig`]
//!
//! # Degraded state
//!
//! If any artifact fails to load, [`Engine::load`] logs the cause and returns
//! a degraded engine. Queries on it return empty results, so the presentation
//! layer can show "data unavailable" instead of failing. There is no reload;
//! restart the process with fixed artifacts.
//!
//! ```rust,no_run
//! use shelfwise::{Engine, EngineConfig};
//!
//! let engine = Engine::load(&EngineConfig::from_env());
//! let similar = engine.recommend("The Hobbit")?;
//! for book in similar.iter().skip(1) {
//!     println!("{} by {}", book.title, book.author);
//! }
//! # Ok::<(), shelfwise::RecommendError>(())
//! ```

pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod neighbors;
pub mod persistence;
pub mod pivot;
pub mod simd;

// Re-exports
pub use config::EngineConfig;
pub use distance::DistanceMetric;
pub use engine::{
    Catalog, Engine, LoadError, Recommendation, RecommendationEntry, NEIGHBOR_COUNT,
    PLACEHOLDER_POSTER_URL, TOP_RATED_COUNT,
};
pub use error::{RecommendError, Result};
pub use metadata::{MetadataTable, RatingRecord, Year};
pub use neighbors::{FittedModel, Neighbor, NeighborModel};
pub use pivot::PivotIndex;
