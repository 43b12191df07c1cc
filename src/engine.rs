//! Recommendation engine: title in, similar titles with display metadata out.
//!
//! A [`Catalog`] bundles the four loaded structures. It is built once and
//! never mutated, so queries take `&self` and run concurrently without
//! locks. [`Engine`] wraps the catalog in an `Arc`, or records why loading
//! failed; in that degraded state every query answers with an empty
//! [`Recommendation`] instead of an error.
//!
//! ```text
//! title ─▶ PivotIndex::position_of ─▶ row_at ─▶ NeighborModel (k = 6)
//!                                                   │
//!        Recommendation ◀─ MetadataTable ◀─ title_at ◀┘
//! ```

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::error::{RecommendError, Result};
use crate::metadata::{MetadataTable, RatingRecord, Year};
use crate::neighbors::{FittedModel, NeighborModel};
use crate::persistence::{ArtifactStore, PersistenceError};
use crate::pivot::PivotIndex;

/// Neighbors requested per query. The queried title is its own nearest
/// neighbor and comes back as entry 0, so this yields five other titles.
pub const NEIGHBOR_COUNT: usize = 6;

/// Books shown on the landing page.
pub const TOP_RATED_COUNT: usize = 5;

/// Poster URL used when a record has no usable image URL.
pub const PLACEHOLDER_POSTER_URL: &str = "https://via.placeholder.com/150";

/// Six parallel sequences describing a ranked list of books.
///
/// All six always have the same length; entry `i` of each describes the same
/// book.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recommendation {
    titles: Vec<String>,
    poster_urls: Vec<String>,
    authors: Vec<String>,
    years: Vec<Year>,
    isbns: Vec<String>,
    publishers: Vec<String>,
}

/// One book of a [`Recommendation`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationEntry<'a> {
    pub title: &'a str,
    pub poster_url: &'a str,
    pub author: &'a str,
    pub year: &'a Year,
    pub isbn: &'a str,
    pub publisher: &'a str,
}

impl Recommendation {
    /// Six empty sequences.
    pub fn empty() -> Self {
        Self::default()
    }

    fn with_capacity(n: usize) -> Self {
        Self {
            titles: Vec::with_capacity(n),
            poster_urls: Vec::with_capacity(n),
            authors: Vec::with_capacity(n),
            years: Vec::with_capacity(n),
            isbns: Vec::with_capacity(n),
            publishers: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, title: &str, poster_url: &str, record: &RatingRecord) {
        self.titles.push(title.to_string());
        self.poster_urls.push(poster_url.to_string());
        self.authors.push(record.author.clone());
        self.years.push(record.year.clone());
        self.isbns.push(record.isbn.clone());
        self.publishers.push(record.publisher.clone());
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn poster_urls(&self) -> &[String] {
        &self.poster_urls
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    pub fn years(&self) -> &[Year] {
        &self.years
    }

    pub fn isbns(&self) -> &[String] {
        &self.isbns
    }

    pub fn publishers(&self) -> &[String] {
        &self.publishers
    }

    pub fn get(&self, i: usize) -> Option<RecommendationEntry<'_>> {
        Some(RecommendationEntry {
            title: self.titles.get(i)?,
            poster_url: self.poster_urls.get(i)?,
            author: self.authors.get(i)?,
            year: self.years.get(i)?,
            isbn: self.isbns.get(i)?,
            publisher: self.publishers.get(i)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = RecommendationEntry<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

/// Poster URL for display: the record's own URL unless it is blank.
pub fn poster_url(image_url: &str) -> &str {
    if image_url.trim().is_empty() {
        PLACEHOLDER_POSTER_URL
    } else {
        image_url
    }
}

/// Why a catalog could not be loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Model, title list and pivot index do not describe the same rows.
    #[error("artifacts are misaligned: {0}")]
    Misaligned(String),
}

/// The four loaded structures, immutable after construction.
#[derive(Debug)]
pub struct Catalog<M = FittedModel> {
    model: M,
    titles: Vec<String>,
    metadata: MetadataTable,
    pivot: PivotIndex,
}

impl<M: NeighborModel> Catalog<M> {
    pub fn new(model: M, titles: Vec<String>, metadata: MetadataTable, pivot: PivotIndex) -> Self {
        Self {
            model,
            titles,
            metadata,
            pivot,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Titles in pivot order, as offered to the user.
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    pub fn pivot(&self) -> &PivotIndex {
        &self.pivot
    }

    /// Check that the model, title list and pivot index share one row space.
    ///
    /// Nothing here can tell whether the model was fitted on *these* rows,
    /// only that the shapes agree.
    pub fn validate_alignment(&self) -> std::result::Result<(), LoadError> {
        let rows = self.pivot.num_titles();
        if self.model.num_rows() != rows {
            return Err(LoadError::Misaligned(format!(
                "model has {} rows, pivot index has {rows}",
                self.model.num_rows()
            )));
        }
        if self.model.dimension() != self.pivot.num_users() {
            return Err(LoadError::Misaligned(format!(
                "model dimension {} != pivot users {}",
                self.model.dimension(),
                self.pivot.num_users()
            )));
        }
        if self.titles.as_slice() != self.pivot.titles() {
            let first_diff = self
                .titles
                .iter()
                .zip(self.pivot.titles())
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| self.titles.len().min(rows));
            return Err(LoadError::Misaligned(format!(
                "title list ({} titles) differs from pivot index ({rows} titles) at position {first_diff}",
                self.titles.len()
            )));
        }
        Ok(())
    }

    /// Similar titles for `title`, closest first, `title` itself at entry 0.
    ///
    /// An unknown title yields an empty recommendation. A neighbor with no
    /// metadata record is an error: skipping it would silently shorten the
    /// list, and it means the artifacts were not built together.
    pub fn recommend(&self, title: &str) -> Result<Recommendation> {
        let position = match self.pivot.position_of(title) {
            Ok(position) => position,
            Err(_) => {
                debug!(title, "title not in pivot index");
                return Ok(Recommendation::empty());
            }
        };
        let len = self.pivot.num_titles();
        let row = self
            .pivot
            .row_at(position)
            .ok_or(RecommendError::PositionOutOfRange { position, len })?;

        let neighbors = self.model.kneighbors_of_row(position, row, NEIGHBOR_COUNT)?;

        let mut recommendation = Recommendation::with_capacity(neighbors.len());
        for neighbor in &neighbors {
            let neighbor_title = self.pivot.title_at(neighbor.position).ok_or(
                RecommendError::PositionOutOfRange {
                    position: neighbor.position,
                    len,
                },
            )?;
            let record = self.metadata.first_by_title(neighbor_title).ok_or_else(|| {
                RecommendError::MetadataJoin {
                    title: neighbor_title.to_string(),
                }
            })?;
            recommendation.push(neighbor_title, poster_url(&record.image_url), record);
        }
        Ok(recommendation)
    }

    /// The `n` highest-rated records; ties keep table order.
    ///
    /// Poster URLs are passed through as stored.
    pub fn top_rated(&self, n: usize) -> Recommendation {
        let top = self.metadata.top_rated(n);
        let mut recommendation = Recommendation::with_capacity(top.len());
        for record in top {
            recommendation.push(&record.title, &record.image_url, record);
        }
        recommendation
    }
}

/// Process-wide query handle: a loaded catalog, or the reason there is none.
#[derive(Debug)]
pub enum Engine<M = FittedModel> {
    Ready(Arc<Catalog<M>>),
    Degraded { reason: Arc<str> },
}

impl<M> Clone for Engine<M> {
    fn clone(&self) -> Self {
        match self {
            Engine::Ready(catalog) => Engine::Ready(Arc::clone(catalog)),
            Engine::Degraded { reason } => Engine::Degraded {
                reason: Arc::clone(reason),
            },
        }
    }
}

impl Engine<FittedModel> {
    /// Load the artifacts named by `config`.
    ///
    /// Never fails: any error is logged and yields a degraded engine.
    pub fn load(config: &EngineConfig) -> Self {
        match Self::try_load(config) {
            Ok(catalog) => {
                let stats = catalog.model().stats();
                info!(
                    dir = %config.artifacts_dir.display(),
                    titles = catalog.pivot().num_titles(),
                    users = catalog.pivot().num_users(),
                    records = catalog.metadata().len(),
                    algorithm = stats.algorithm,
                    metric = stats.metric.name(),
                    "loaded recommendation catalog"
                );
                Engine::Ready(Arc::new(catalog))
            }
            Err(e) => {
                error!(
                    dir = %config.artifacts_dir.display(),
                    error = %e,
                    "failed to load recommendation artifacts; serving empty results"
                );
                Engine::degraded(e.to_string())
            }
        }
    }

    /// Load the artifacts named by `config`, surfacing the failure.
    pub fn try_load(config: &EngineConfig) -> std::result::Result<Catalog, LoadError> {
        let store = ArtifactStore::from_config(config);
        let (model, titles, metadata, pivot) = store.read_all()?;
        let catalog = Catalog::new(model, titles, metadata, pivot);
        if config.validate_alignment {
            catalog.validate_alignment()?;
        }
        Ok(catalog)
    }
}

impl<M: NeighborModel> Engine<M> {
    pub fn from_catalog(catalog: Catalog<M>) -> Self {
        Engine::Ready(Arc::new(catalog))
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Engine::Degraded {
            reason: Arc::from(reason.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Engine::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Engine::Ready(_) => None,
            Engine::Degraded { reason } => Some(reason.as_ref()),
        }
    }

    pub fn catalog(&self) -> Option<&Catalog<M>> {
        match self {
            Engine::Ready(catalog) => Some(catalog.as_ref()),
            Engine::Degraded { .. } => None,
        }
    }

    /// See [`Catalog::recommend`]. Degraded engines return an empty result.
    pub fn recommend(&self, title: &str) -> Result<Recommendation> {
        match self {
            Engine::Ready(catalog) => catalog.recommend(title),
            Engine::Degraded { .. } => {
                debug!(title, "recommend on degraded engine");
                Ok(Recommendation::empty())
            }
        }
    }

    /// See [`Catalog::top_rated`]. Degraded engines return an empty result.
    pub fn top_rated(&self, n: usize) -> Recommendation {
        match self {
            Engine::Ready(catalog) => catalog.top_rated(n),
            Engine::Degraded { .. } => {
                debug!(n, "top_rated on degraded engine");
                Recommendation::empty()
            }
        }
    }

    /// The landing page selection: [`TOP_RATED_COUNT`] best-rated books.
    pub fn landing_page(&self) -> Recommendation {
        self.top_rated(TOP_RATED_COUNT)
    }

    /// Every known title, for a selection control. Empty when degraded.
    pub fn list_titles(&self) -> &[String] {
        match self {
            Engine::Ready(catalog) => catalog.titles(),
            Engine::Degraded { .. } => &[],
        }
    }
}
