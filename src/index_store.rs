//! On-disk persistence for a unit's [`EmbeddingIndex`].
//!
//! Layout under `<unit_dir>/vector_index/`:
//!
//! | File | Contents |
//! |------|----------|
//! | `manifest.json` | format version, model, dims, count, and every chunk (`index`, `offset`, `text`, `hash`) |
//! | `vectors.bin` | all vectors, concatenated little-endian `f32`, in chunk order |
//!
//! Both files are replaced atomically; the manifest is written last.
//!
//! # Trust
//!
//! Only data this application wrote for the same unit is ever loaded. The
//! format carries consistency checks (sizes, chunk hashes) to catch
//! truncation and stale files, but it is not hardened against crafted
//! input. Never point [`load_index`] at a directory from an external
//! source.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use mindforge_core::embedding::{blob_to_vec, vec_to_blob};
use mindforge_core::index::{EmbeddingIndex, IndexEntry};
use mindforge_core::models::{content_hash, Chunk};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fsutil::{write_atomic, write_json_atomic};

pub const INDEX_DIR: &str = "vector_index";
const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    model: String,
    dims: usize,
    count: usize,
    chunks: Vec<Chunk>,
}

pub fn index_dir(unit_dir: &Path) -> PathBuf {
    unit_dir.join(INDEX_DIR)
}

/// Persist `index`, replacing any index previously saved for the unit.
pub fn save_index(index: &EmbeddingIndex, unit_dir: &Path) -> Result<()> {
    let dir = index_dir(unit_dir);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

    let mut vectors = Vec::with_capacity(index.len() * index.dims() * 4);
    for entry in index.entries() {
        vectors.extend_from_slice(&vec_to_blob(&entry.vector));
    }
    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        model: index.model().to_string(),
        dims: index.dims(),
        count: index.len(),
        chunks: index.entries().iter().map(|e| e.chunk.clone()).collect(),
    };

    write_atomic(&dir.join(VECTORS_FILE), &vectors)?;
    write_json_atomic(&dir.join(MANIFEST_FILE), &manifest)?;

    info!(
        dir = %dir.display(),
        chunks = index.len(),
        model = index.model(),
        "saved embedding index"
    );
    Ok(())
}

/// Load the unit's saved index.
///
/// Returns `None` when nothing was saved or when the saved files are
/// unreadable, inconsistent, or of an unknown format version. A unit
/// without an index still opens; it just cannot answer questions.
pub fn load_index(unit_dir: &Path) -> Option<EmbeddingIndex> {
    let dir = index_dir(unit_dir);
    if !dir.join(MANIFEST_FILE).exists() {
        debug!(dir = %dir.display(), "no saved index");
        return None;
    }
    match read_index(&dir) {
        Ok(index) => {
            debug!(dir = %dir.display(), chunks = index.len(), "loaded embedding index");
            Some(index)
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %format!("{:#}", e), "ignoring unreadable index");
            None
        }
    }
}

fn read_index(dir: &Path) -> Result<EmbeddingIndex> {
    let manifest_bytes = fs::read(dir.join(MANIFEST_FILE)).context("Failed to read manifest")?;
    let manifest: Manifest =
        serde_json::from_slice(&manifest_bytes).context("Failed to parse manifest")?;

    if manifest.format_version != FORMAT_VERSION {
        bail!("unsupported index format version {}", manifest.format_version);
    }
    if manifest.chunks.len() != manifest.count {
        bail!(
            "manifest lists {} chunks but declares {}",
            manifest.chunks.len(),
            manifest.count
        );
    }

    let vectors = fs::read(dir.join(VECTORS_FILE)).context("Failed to read vectors")?;
    let expected_bytes = manifest
        .dims
        .checked_mul(4)
        .and_then(|row| manifest.count.checked_mul(row).map(|total| (row, total)));
    let Some((row_bytes, total_bytes)) = expected_bytes else {
        bail!(
            "manifest size overflows: {} chunks of {} dims",
            manifest.count,
            manifest.dims
        );
    };
    if vectors.len() != total_bytes {
        bail!(
            "vectors.bin is {} bytes, expected {}",
            vectors.len(),
            total_bytes
        );
    }

    let mut entries = Vec::with_capacity(manifest.count);
    for (chunk, row) in manifest.chunks.into_iter().zip(vectors.chunks_exact(row_bytes.max(1))) {
        if content_hash(&chunk.text) != chunk.hash {
            bail!("chunk {} text does not match its hash", chunk.index);
        }
        entries.push(IndexEntry {
            chunk,
            vector: blob_to_vec(row),
        });
    }

    EmbeddingIndex::from_parts(manifest.model, manifest.dims, entries)
        .context("Saved index is inconsistent")
}

/// Delete the unit's saved index, if any.
pub fn remove_index(unit_dir: &Path) -> Result<()> {
    let dir = index_dir(unit_dir);
    match fs::remove_dir_all(&dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", dir.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_index() -> EmbeddingIndex {
        let vectors = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.6, 0.0, 0.8]];
        let entries = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| IndexEntry {
                chunk: Chunk::new(i, i * 100, format!("chunk number {}", i)),
                vector: v.to_vec(),
            })
            .collect();
        EmbeddingIndex::from_parts("test-model", 3, entries).unwrap()
    }

    #[test]
    fn round_trip_preserves_search() {
        let tmp = TempDir::new().unwrap();
        let index = sample_index();
        save_index(&index, tmp.path()).unwrap();

        let loaded = load_index(tmp.path()).unwrap();
        assert_eq!(loaded, index);
        for entry in index.entries() {
            let top = loaded.search(&entry.vector, 1).unwrap();
            assert_eq!(top[0].chunk.index, entry.chunk.index);
        }
    }

    #[test]
    fn missing_index_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_index(tmp.path()).is_none());
    }

    #[test]
    fn truncated_vectors_are_rejected() {
        let tmp = TempDir::new().unwrap();
        save_index(&sample_index(), tmp.path()).unwrap();
        let path = index_dir(tmp.path()).join(VECTORS_FILE);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();
        assert!(load_index(tmp.path()).is_none());
    }

    #[test]
    fn oversized_manifest_dims_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = index_dir(tmp.path());
        fs::create_dir_all(&dir).unwrap();
        let manifest = serde_json::json!({
            "format_version": FORMAT_VERSION,
            "model": "m",
            "dims": usize::MAX / 2,
            "count": 0,
            "chunks": [],
        });
        fs::write(dir.join(MANIFEST_FILE), manifest.to_string()).unwrap();
        fs::write(dir.join(VECTORS_FILE), b"").unwrap();
        assert!(load_index(tmp.path()).is_none());

        let manifest = serde_json::json!({
            "format_version": FORMAT_VERSION,
            "model": "m",
            "dims": 4,
            "count": usize::MAX / 8,
            "chunks": [],
        });
        fs::write(dir.join(MANIFEST_FILE), manifest.to_string()).unwrap();
        assert!(load_index(tmp.path()).is_none());
    }

    #[test]
    fn corrupt_manifest_is_rejected() {
        let tmp = TempDir::new().unwrap();
        save_index(&sample_index(), tmp.path()).unwrap();
        fs::write(index_dir(tmp.path()).join(MANIFEST_FILE), b"{not json").unwrap();
        assert!(load_index(tmp.path()).is_none());
    }

    #[test]
    fn edited_chunk_text_is_rejected() {
        let tmp = TempDir::new().unwrap();
        save_index(&sample_index(), tmp.path()).unwrap();
        let path = index_dir(tmp.path()).join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("chunk number 1", "chunk number 9")).unwrap();
        assert!(load_index(tmp.path()).is_none());
    }

    #[test]
    fn save_replaces_previous_index() {
        let tmp = TempDir::new().unwrap();
        save_index(&sample_index(), tmp.path()).unwrap();
        let smaller = EmbeddingIndex::from_parts(
            "test-model",
            2,
            vec![IndexEntry {
                chunk: Chunk::new(0, 0, "only"),
                vector: vec![1.0, 1.0],
            }],
        )
        .unwrap();
        save_index(&smaller, tmp.path()).unwrap();
        assert_eq!(load_index(tmp.path()).unwrap(), smaller);
    }

    #[test]
    fn remove_index_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        save_index(&sample_index(), tmp.path()).unwrap();
        remove_index(tmp.path()).unwrap();
        remove_index(tmp.path()).unwrap();
        assert!(load_index(tmp.path()).is_none());
    }
}
