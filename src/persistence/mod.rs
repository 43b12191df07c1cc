//! Disk persistence for the recommendation catalog.
//!
//! The offline training run produces four artifacts (fitted model, title
//! list, metadata table, pivot index). This module reads them back at
//! startup and can write them, which is how tests and tooling build
//! artifact directories.
//!
//! Every artifact is a small self-checking file (magic, version, kind,
//! CRC32, postcard payload), and the directory carries a JSON manifest that
//! ties the four files of one training run together. See [`format`].

pub mod error;
pub mod format;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use format::{ArtifactKind, ArtifactManifest};
pub use store::ArtifactStore;
