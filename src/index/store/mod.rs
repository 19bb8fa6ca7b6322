// Persisted index store
//
// An index lives in a single directory below a trusted root:
//
//   manifest.json  format tag, version, dimension, entry count, checksum
//   vectors.bin    little-endian f32 values, one row per entry
//   chunks.json    chunk texts in entry order
//
// Nothing in the directory is executable or type-directed; loading only
// parses plain numbers and strings, and the checksum must match before any
// entry is built.


use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{IndexEntry, VectorIndex};
use crate::{QaError, Result};

/// Directory name of the persisted index below the store root
pub const INDEX_DIR_NAME: &str = "faiss_index";

const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const CHUNKS_FILE: &str = "chunks.json";

const FORMAT_TAG: &str = "pdf-qa-index";
const FORMAT_VERSION: u32 = 1;

/// Metadata written alongside a persisted index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format: String,
    pub version: u32,
    pub dimension: usize,
    pub entries: usize,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 over the vectors and chunks files
    pub checksum: String,
}

/// Reads and writes the index below a directory the application controls
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    #[inline]
    pub fn new(trusted_root: impl Into<PathBuf>) -> Self {
        Self {
            root: trusted_root.into(),
        }
    }

    /// Directory holding the persisted index
    #[inline]
    pub fn location(&self) -> PathBuf {
        self.root.join(INDEX_DIR_NAME)
    }

    #[inline]
    pub fn exists(&self) -> bool {
        self.location().join(MANIFEST_FILE).is_file()
    }

    /// Write `index` to the store, replacing any previous index as a whole.
    ///
    /// Files are written into a staging directory first and swapped into
    /// place once complete, so a partially written index is never visible.
    /// The previous index is moved aside before the new one is renamed in;
    /// a concurrent reader may briefly find no index at all.
    #[inline]
    pub fn persist(&self, index: &VectorIndex, embedding_model: &str) -> Result<IndexManifest> {
        fs::create_dir_all(&self.root)?;

        let staging = self
            .root
            .join(format!(".{INDEX_DIR_NAME}.staging-{}", Uuid::new_v4()));
        fs::create_dir_all(&staging)?;

        let result = write_index_files(&staging, index, embedding_model)
            .and_then(|manifest| self.swap_into_place(&staging).map(|()| manifest));

        match result {
            Ok(manifest) => {
                info!(
                    "Persisted index with {} entries to {}",
                    manifest.entries,
                    self.location().display()
                );
                Ok(manifest)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    debug!("Failed to remove staging directory: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// Read only the manifest of the persisted index
    #[inline]
    pub fn read_manifest(&self) -> Result<IndexManifest> {
        let location = self.location();
        let manifest_path = location.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(QaError::IndexNotFound(location));
        }

        let bytes = fs::read(&manifest_path)?;
        let manifest: IndexManifest = serde_json::from_slice(&bytes)
            .map_err(|e| corrupt(&location, format!("unreadable manifest: {e}")))?;

        if manifest.format != FORMAT_TAG || manifest.version != FORMAT_VERSION {
            return Err(corrupt(
                &location,
                format!(
                    "unsupported format {} version {}",
                    manifest.format, manifest.version
                ),
            ));
        }

        Ok(manifest)
    }

    /// Load the persisted index, checking it against the dimension of the
    /// embeddings it will be queried with
    #[inline]
    pub fn load(&self, expected_dimension: usize) -> Result<VectorIndex> {
        let location = self.location();
        let manifest = self.read_manifest()?;

        if manifest.dimension != expected_dimension {
            return Err(QaError::DimensionMismatch {
                expected: expected_dimension,
                found: manifest.dimension,
            });
        }

        let vector_bytes = fs::read(location.join(VECTORS_FILE))
            .map_err(|e| corrupt(&location, format!("unreadable {VECTORS_FILE}: {e}")))?;
        let chunk_bytes = fs::read(location.join(CHUNKS_FILE))
            .map_err(|e| corrupt(&location, format!("unreadable {CHUNKS_FILE}: {e}")))?;

        if payload_checksum(&vector_bytes, &chunk_bytes) != manifest.checksum {
            return Err(corrupt(&location, "checksum mismatch".to_string()));
        }

        let texts: Vec<String> = serde_json::from_slice(&chunk_bytes)
            .map_err(|e| corrupt(&location, format!("unreadable {CHUNKS_FILE}: {e}")))?;

        if texts.len() != manifest.entries {
            return Err(corrupt(
                &location,
                format!(
                    "manifest lists {} entries but {} chunks are stored",
                    manifest.entries,
                    texts.len()
                ),
            ));
        }

        let expected_bytes = manifest
            .entries
            .checked_mul(manifest.dimension)
            .and_then(|values| values.checked_mul(size_of::<f32>()));
        if expected_bytes != Some(vector_bytes.len()) {
            return Err(corrupt(
                &location,
                format!(
                    "{VECTORS_FILE} holds {} bytes, not {} rows of dimension {}",
                    vector_bytes.len(),
                    manifest.entries,
                    manifest.dimension
                ),
            ));
        }

        let mut values = vector_bytes
            .chunks_exact(size_of::<f32>())
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]));

        let entries = texts
            .into_iter()
            .map(|text| IndexEntry {
                vector: values.by_ref().take(manifest.dimension).collect(),
                text,
            })
            .collect();

        debug!(
            "Loaded index with {} entries (model {}, created {})",
            manifest.entries, manifest.embedding_model, manifest.created_at
        );

        VectorIndex::build(entries)
    }

    fn swap_into_place(&self, staging: &Path) -> Result<()> {
        let location = self.location();

        let backup = if location.exists() {
            let backup = self
                .root
                .join(format!(".{INDEX_DIR_NAME}.old-{}", Uuid::new_v4()));
            fs::rename(&location, &backup)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(staging, &location) {
            if let Some(backup) = &backup {
                if let Err(restore) = fs::rename(backup, &location) {
                    warn!("Failed to restore previous index: {}", restore);
                }
            }
            return Err(e.into());
        }

        if let Some(backup) = backup {
            if let Err(e) = fs::remove_dir_all(&backup) {
                warn!(
                    "Failed to remove previous index at {}: {}",
                    backup.display(),
                    e
                );
            }
        }

        Ok(())
    }
}

fn write_index_files(
    dir: &Path,
    index: &VectorIndex,
    embedding_model: &str,
) -> Result<IndexManifest> {
    let mut vector_bytes =
        Vec::with_capacity(index.len() * index.dimension() * size_of::<f32>());
    for entry in index.entries() {
        for value in &entry.vector {
            vector_bytes.extend_from_slice(&value.to_le_bytes());
        }
    }

    let texts: Vec<&str> = index.entries().iter().map(|e| e.text.as_str()).collect();
    let chunk_bytes = serde_json::to_vec(&texts)?;

    let manifest = IndexManifest {
        format: FORMAT_TAG.to_string(),
        version: FORMAT_VERSION,
        dimension: index.dimension(),
        entries: index.len(),
        embedding_model: embedding_model.to_string(),
        created_at: Utc::now(),
        checksum: payload_checksum(&vector_bytes, &chunk_bytes),
    };

    write_synced(&dir.join(VECTORS_FILE), &vector_bytes)?;
    write_synced(&dir.join(CHUNKS_FILE), &chunk_bytes)?;
    // Manifest last: its presence marks a complete directory
    write_synced(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;

    Ok(manifest)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn payload_checksum(vector_bytes: &[u8], chunk_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((vector_bytes.len() as u64).to_le_bytes());
    hasher.update(vector_bytes);
    hasher.update(chunk_bytes);
    format!("{:x}", hasher.finalize())
}

fn corrupt(location: &Path, reason: String) -> QaError {
    QaError::CorruptIndex {
        path: location.to_path_buf(),
        reason,
    }
}
