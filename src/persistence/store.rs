//! Reading and writing the artifact directory.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::error::{PersistenceError, PersistenceResult};
use super::format::{
    decode_artifact, encode_artifact, header_checksum, ArtifactEntry, ArtifactKind,
    ArtifactManifest, FORMAT_VERSION,
};
use crate::config::EngineConfig;
use crate::engine::Catalog;
use crate::metadata::MetadataTable;
use crate::neighbors::{FittedModel, NeighborModel};
use crate::pivot::PivotIndex;

/// An artifact directory plus the file names of its members.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    model_file: String,
    titles_file: String,
    metadata_file: String,
    pivot_file: String,
    manifest_file: String,
}

impl ArtifactStore {
    /// Store at `config.artifacts_dir` using the configured file names.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            root: config.artifacts_dir.clone(),
            model_file: config.model_file.clone(),
            titles_file: config.titles_file.clone(),
            metadata_file: config.metadata_file.clone(),
            pivot_file: config.pivot_file.clone(),
            manifest_file: config.manifest_file.clone(),
        }
    }

    /// Store at `root` with the default file names.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::from_config(&EngineConfig::with_artifacts_dir(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Model => &self.model_file,
            ArtifactKind::Titles => &self.titles_file,
            ArtifactKind::Metadata => &self.metadata_file,
            ArtifactKind::Pivot => &self.pivot_file,
        }
    }

    pub fn path_of(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(self.file_name(kind))
    }

    /// The manifest, if the directory has one.
    pub fn read_manifest(&self) -> PersistenceResult<Option<ArtifactManifest>> {
        let path = self.root.join(&self.manifest_file);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest: ArtifactManifest = serde_json::from_str(&text)
            .map_err(|e| PersistenceError::Deserialization(format!("manifest: {e}")))?;
        if manifest.version != FORMAT_VERSION {
            return Err(PersistenceError::Format(format!(
                "manifest version {} unsupported, expected {FORMAT_VERSION}",
                manifest.version
            )));
        }
        Ok(Some(manifest))
    }

    fn read_artifact<T: DeserializeOwned>(
        &self,
        kind: ArtifactKind,
        manifest: Option<&ArtifactManifest>,
    ) -> PersistenceResult<T> {
        let path = self.path_of(kind);
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PersistenceError::NotFound(path.clone()),
            _ => PersistenceError::Io(e),
        })?;

        // A file from another training run carries a different checksum than
        // the one recorded next to its siblings.
        if let (Some(entry), Some(actual)) = (
            manifest.and_then(|m| m.entry(kind)),
            header_checksum(&bytes),
        ) {
            if entry.checksum != actual {
                return Err(PersistenceError::ChecksumMismatch {
                    expected: entry.checksum,
                    actual,
                });
            }
        }

        let value = decode_artifact(kind, &bytes)?;
        debug!(artifact = kind.name(), path = %path.display(), bytes = bytes.len(), "read artifact");
        Ok(value)
    }

    pub fn read_model(&self) -> PersistenceResult<FittedModel> {
        let manifest = self.read_manifest()?;
        self.read_artifact(ArtifactKind::Model, manifest.as_ref())
    }

    pub fn read_titles(&self) -> PersistenceResult<Vec<String>> {
        let manifest = self.read_manifest()?;
        self.read_artifact(ArtifactKind::Titles, manifest.as_ref())
    }

    pub fn read_metadata(&self) -> PersistenceResult<MetadataTable> {
        let manifest = self.read_manifest()?;
        self.read_artifact(ArtifactKind::Metadata, manifest.as_ref())
    }

    pub fn read_pivot(&self) -> PersistenceResult<PivotIndex> {
        let manifest = self.read_manifest()?;
        self.read_artifact(ArtifactKind::Pivot, manifest.as_ref())
    }

    /// Read all four artifacts, consulting the manifest once.
    pub fn read_all(
        &self,
    ) -> PersistenceResult<(FittedModel, Vec<String>, MetadataTable, PivotIndex)> {
        let manifest = self.read_manifest()?;
        let manifest = manifest.as_ref();
        Ok((
            self.read_artifact(ArtifactKind::Model, manifest)?,
            self.read_artifact(ArtifactKind::Titles, manifest)?,
            self.read_artifact(ArtifactKind::Metadata, manifest)?,
            self.read_artifact(ArtifactKind::Pivot, manifest)?,
        ))
    }

    /// Write every artifact of `catalog` plus a manifest.
    ///
    /// Each file is written to a temporary name and renamed into place.
    pub fn write_catalog(&self, catalog: &Catalog<FittedModel>) -> PersistenceResult<ArtifactManifest> {
        std::fs::create_dir_all(&self.root)?;

        let artifacts = vec![
            self.write_artifact(ArtifactKind::Model, catalog.model(), catalog.model().num_rows())?,
            self.write_artifact(ArtifactKind::Titles, catalog.titles(), catalog.titles().len())?,
            self.write_artifact(
                ArtifactKind::Metadata,
                catalog.metadata(),
                catalog.metadata().len(),
            )?,
            self.write_artifact(ArtifactKind::Pivot, catalog.pivot(), catalog.pivot().num_titles())?,
        ];

        let manifest = ArtifactManifest {
            version: FORMAT_VERSION,
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            artifacts,
        };
        let json = serde_json::to_vec_pretty(&manifest)?;
        atomic_write(&self.root.join(&self.manifest_file), &json)?;

        info!(dir = %self.root.display(), "wrote artifact catalog");
        Ok(manifest)
    }

    fn write_artifact<T: Serialize + ?Sized>(
        &self,
        kind: ArtifactKind,
        value: &T,
        rows: usize,
    ) -> PersistenceResult<ArtifactEntry> {
        let bytes = encode_artifact(kind, value)?;
        let checksum = header_checksum(&bytes).ok_or_else(|| {
            PersistenceError::Format(format!("{} artifact header missing", kind.name()))
        })?;
        atomic_write(&self.path_of(kind), &bytes)?;
        Ok(ArtifactEntry {
            kind,
            file: self.file_name(kind).to_string(),
            rows: rows as u64,
            checksum,
        })
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> PersistenceResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
