//! On-disk artifact format.
//!
//! # Directory Layout
//!
//! ```text
//! artifacts/
//! ├── manifest.json      # ArtifactManifest: version, files, row counts
//! ├── model.bin          # FittedModel
//! ├── book_names.bin     # Vec<String>, pivot row order
//! ├── final_rating.bin   # MetadataTable
//! └── book_pivot.bin     # PivotIndex
//! ```
//!
//! # Artifact File Format
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Magic bytes (4B): "SHLF"                │
//! │ Format version (4B, LE u32)             │
//! │ Artifact kind (1B)                      │
//! │ CRC32 of payload (4B, LE u32)           │
//! ├─────────────────────────────────────────┤
//! │ Payload: postcard-encoded value         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Readers reject a file whose magic, version, or kind does not match what
//! they expect, and verify the checksum before decoding.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{PersistenceError, PersistenceResult};

/// Magic bytes for artifact files.
pub const ARTIFACT_MAGIC: [u8; 4] = *b"SHLF";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed header preceding every payload.
pub const HEADER_LEN: usize = 4 + 4 + 1 + 4;

/// The four artifacts a catalog is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ArtifactKind {
    /// Fitted neighbor model
    Model = 1,
    /// Ordered title list
    Titles = 2,
    /// Metadata table
    Metadata = 3,
    /// Pivot index
    Pivot = 4,
}

impl ArtifactKind {
    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Titles => "titles",
            ArtifactKind::Metadata => "metadata",
            ArtifactKind::Pivot => "pivot",
        }
    }
}

impl TryFrom<u8> for ArtifactKind {
    type Error = PersistenceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ArtifactKind::Model),
            2 => Ok(ArtifactKind::Titles),
            3 => Ok(ArtifactKind::Metadata),
            4 => Ok(ArtifactKind::Pivot),
            other => Err(PersistenceError::Format(format!(
                "unknown artifact kind tag {other}"
            ))),
        }
    }
}

/// One artifact listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub kind: ArtifactKind,
    pub file: String,
    /// Rows (titles, records, or model rows) in the artifact.
    pub rows: u64,
    pub checksum: u32,
}

/// Manifest for the artifact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Format version
    pub version: u32,
    /// Creation timestamp (Unix seconds)
    pub created_at: u64,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactManifest {
    pub fn entry(&self, kind: ArtifactKind) -> Option<&ArtifactEntry> {
        self.artifacts.iter().find(|e| e.kind == kind)
    }
}

/// Encode `value` as a complete artifact file (header + payload).
pub fn encode_artifact<T: Serialize + ?Sized>(
    kind: ArtifactKind,
    value: &T,
) -> PersistenceResult<Vec<u8>> {
    let payload = postcard::to_stdvec(value).map_err(|e| {
        PersistenceError::Serialization(format!("postcard error in {}: {e}", kind.name()))
    })?;
    let checksum = crc32fast::hash(&payload);

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&ARTIFACT_MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.push(kind as u8);
    bytes.extend_from_slice(&checksum.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode an artifact file, checking magic, version, kind, and checksum.
pub fn decode_artifact<T: DeserializeOwned>(
    expected: ArtifactKind,
    bytes: &[u8],
) -> PersistenceResult<T> {
    let (header, payload) = bytes.split_at_checked(HEADER_LEN).ok_or_else(|| {
        PersistenceError::Format(format!(
            "{} artifact truncated: {} bytes, header needs {HEADER_LEN}",
            expected.name(),
            bytes.len()
        ))
    })?;

    if header[0..4] != ARTIFACT_MAGIC {
        return Err(PersistenceError::Format(format!(
            "{} artifact has bad magic {:?}",
            expected.name(),
            &header[0..4]
        )));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != FORMAT_VERSION {
        return Err(PersistenceError::Format(format!(
            "{} artifact has version {version}, expected {FORMAT_VERSION}",
            expected.name()
        )));
    }

    let kind = ArtifactKind::try_from(header[8])?;
    if kind != expected {
        return Err(PersistenceError::Format(format!(
            "expected {} artifact, found {}",
            expected.name(),
            kind.name()
        )));
    }

    let expected_crc = u32::from_le_bytes([header[9], header[10], header[11], header[12]]);
    let actual_crc = crc32fast::hash(payload);
    if expected_crc != actual_crc {
        return Err(PersistenceError::ChecksumMismatch {
            expected: expected_crc,
            actual: actual_crc,
        });
    }

    postcard::from_bytes(payload).map_err(|e| {
        PersistenceError::Deserialization(format!("postcard error in {}: {e}", expected.name()))
    })
}

/// Checksum recorded in an encoded artifact's header.
pub fn header_checksum(bytes: &[u8]) -> Option<u32> {
    let h = bytes.get(9..HEADER_LEN)?;
    Some(u32::from_le_bytes([h[0], h[1], h[2], h[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_survive_encoding() {
        let titles = vec!["Dune".to_string(), "Emma".to_string()];
        let bytes = encode_artifact(ArtifactKind::Titles, &titles).expect("encode");
        assert_eq!(&bytes[0..4], b"SHLF");
        let back: Vec<String> = decode_artifact(ArtifactKind::Titles, &bytes).expect("decode");
        assert_eq!(back, titles);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let bytes = encode_artifact(ArtifactKind::Titles, &vec!["a".to_string()]).expect("encode");
        let err = decode_artifact::<Vec<String>>(ArtifactKind::Pivot, &bytes).unwrap_err();
        assert!(matches!(err, PersistenceError::Format(_)), "{err}");
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut bytes =
            encode_artifact(ArtifactKind::Titles, &vec!["abc".to_string()]).expect("encode");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = decode_artifact::<Vec<String>>(ArtifactKind::Titles, &bytes).unwrap_err();
        assert!(matches!(err, PersistenceError::ChecksumMismatch { .. }), "{err}");
    }

    #[test]
    fn truncated_and_foreign_files_are_rejected() {
        assert!(decode_artifact::<Vec<String>>(ArtifactKind::Titles, b"SHL").is_err());

        let mut bytes = encode_artifact(ArtifactKind::Titles, &Vec::<String>::new()).expect("encode");
        bytes[0] = b'X';
        assert!(matches!(
            decode_artifact::<Vec<String>>(ArtifactKind::Titles, &bytes),
            Err(PersistenceError::Format(_))
        ));

        let mut bytes = encode_artifact(ArtifactKind::Titles, &Vec::<String>::new()).expect("encode");
        bytes[4] = 9;
        assert!(matches!(
            decode_artifact::<Vec<String>>(ArtifactKind::Titles, &bytes),
            Err(PersistenceError::Format(_))
        ));
    }

    #[test]
    fn kind_tags_round_trip_through_u8() {
        for kind in [
            ArtifactKind::Model,
            ArtifactKind::Titles,
            ArtifactKind::Metadata,
            ArtifactKind::Pivot,
        ] {
            assert_eq!(ArtifactKind::try_from(kind as u8).expect("known tag"), kind);
        }
        assert!(ArtifactKind::try_from(0).is_err());
    }
}
