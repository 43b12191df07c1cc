//! Engine configuration: where the artifacts live and how strictly to load them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::persistence::{PersistenceError, PersistenceResult};

/// Environment variable that overrides [`EngineConfig::artifacts_dir`].
pub const ARTIFACTS_DIR_ENV: &str = "SHELFWISE_ARTIFACTS_DIR";

/// Configuration for [`crate::Engine::load`].
///
/// Every field has a default, so a JSON file only needs the keys it changes:
///
/// ```rust
/// let config: shelfwise::EngineConfig =
///     serde_json::from_str(r#"{ "artifacts_dir": "/srv/books" }"#).unwrap();
/// assert_eq!(config.model_file, "model.bin");
/// assert!(config.validate_alignment);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the four artifacts and the manifest.
    pub artifacts_dir: PathBuf,
    pub model_file: String,
    pub titles_file: String,
    pub metadata_file: String,
    pub pivot_file: String,
    pub manifest_file: String,
    /// Check that model, title list and pivot index share one row space.
    pub validate_alignment: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            model_file: "model.bin".to_string(),
            titles_file: "book_names.bin".to_string(),
            metadata_file: "final_rating.bin".to_string(),
            pivot_file: "book_pivot.bin".to_string(),
            manifest_file: "manifest.json".to_string(),
            validate_alignment: true,
        }
    }
}

impl EngineConfig {
    /// Default file names under `dir`.
    pub fn with_artifacts_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PersistenceError::NotFound(path.to_path_buf()),
            _ => PersistenceError::Io(e),
        })?;
        serde_json::from_str(&text).map_err(|e| {
            PersistenceError::Deserialization(format!("config {}: {e}", path.display()))
        })
    }

    /// Defaults, with the artifacts directory taken from
    /// [`ARTIFACTS_DIR_ENV`] when set.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = std::env::var_os(ARTIFACTS_DIR_ENV).filter(|d| !d.is_empty()) {
            self.artifacts_dir = PathBuf::from(dir);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "validate_alignment": false, "pivot_file": "p.bin" }"#)
                .expect("parse");
        assert!(!config.validate_alignment);
        assert_eq!(config.pivot_file, "p.bin");
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(config.titles_file, "book_names.bin");
    }

    #[test]
    fn from_json_file_reads_and_reports_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shelfwise.json");
        let mut f = std::fs::File::create(&path).expect("create");
        writeln!(f, r#"{{ "artifacts_dir": "/data/books" }}"#).expect("write");

        let config = EngineConfig::from_json_file(&path).expect("load");
        assert_eq!(config.artifacts_dir, PathBuf::from("/data/books"));

        let missing = EngineConfig::from_json_file(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(PersistenceError::NotFound(_))));
    }

    #[test]
    fn malformed_json_is_a_deserialization_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            EngineConfig::from_json_file(&path),
            Err(PersistenceError::Deserialization(_))
        ));
    }
}
