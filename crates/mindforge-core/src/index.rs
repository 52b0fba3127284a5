//! In-memory embedding index with exact cosine search.
//!
//! An [`EmbeddingIndex`] pairs each [`Chunk`] with its embedding vector and
//! records the model that produced them. Units hold tens to low hundreds of
//! chunks, so search is a brute-force scan over every vector.
//!
//! Indexes are never updated in place. [`build_index`] always produces a
//! fresh index from a full chunk list and the caller replaces whatever it
//! held before.

use thiserror::Error;
use tracing::{debug, warn};

use crate::embedding::{cosine_similarity, EmbeddingError, EmbeddingProvider};
use crate::models::Chunk;

/// Errors from constructing or querying an index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("index dimension must be > 0")]
    ZeroDimension,
}

/// One chunk and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A search result borrowed from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Chunks plus vectors, all of one model and dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingIndex {
    model: String,
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl EmbeddingIndex {
    /// Assemble an index, checking that every vector has `dims` elements.
    pub fn from_parts(
        model: impl Into<String>,
        dims: usize,
        entries: Vec<IndexEntry>,
    ) -> Result<Self, IndexError> {
        if dims == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dims) {
            return Err(IndexError::DimensionMismatch {
                expected: dims,
                actual: bad.vector.len(),
            });
        }
        Ok(Self {
            model: model.into(),
            dims,
            entries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Top-`k` entries by cosine similarity to `query`.
    ///
    /// Results are ordered by descending score; equal scores keep the
    /// original chunk order. Entries whose score is NaN (a non-finite
    /// vector) rank last with a score of `-inf`. `k == 0` yields nothing
    /// and `k` larger than the index yields every entry.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>, IndexError> {
        if query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit<'_>> = self
            .entries
            .iter()
            .map(|e| {
                let score = cosine_similarity(query, &e.vector);
                SearchHit {
                    chunk: &e.chunk,
                    // non-finite vectors rank last
                    score: if score.is_nan() { f32::NEG_INFINITY } else { score },
                }
            })
            .collect();

        // Stable sort keeps insertion order for ties.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Embed every chunk and assemble an index, surfacing provider errors.
///
/// Chunks are sent in batches of `batch_size` (treated as at least 1). The
/// provider must return one vector per chunk, all of the same non-zero
/// length, matching [`EmbeddingProvider::dims`] when that is known.
pub async fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<EmbeddingIndex, EmbeddingError> {
    let batch_size = batch_size.max(1);
    let mut expected_dims = provider.dims();
    let mut entries = Vec::with_capacity(chunks.len());

    for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = provider.embed(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: batch.len(),
                actual: vectors.len(),
            });
        }
        debug!(batch = batch_no, size = batch.len(), "embedded batch");

        for (chunk, vector) in batch.iter().zip(vectors) {
            if expected_dims == 0 {
                expected_dims = vector.len();
            }
            if vector.is_empty() || vector.len() != expected_dims {
                return Err(EmbeddingError::Malformed(format!(
                    "chunk {} has dimension {}, expected {}",
                    chunk.index,
                    vector.len(),
                    expected_dims
                )));
            }
            entries.push(IndexEntry {
                chunk: chunk.clone(),
                vector,
            });
        }
    }

    EmbeddingIndex::from_parts(provider.model_name(), expected_dims, entries)
        .map_err(|e| EmbeddingError::Malformed(e.to_string()))
}

/// Build a fresh index, or `None` when no index can be built.
///
/// `None` is the "no index" sentinel: it covers an empty chunk list and
/// every embedding failure, including an unavailable provider. Callers
/// inform the user and carry on without retrieval.
pub async fn build_index(
    provider: &dyn EmbeddingProvider,
    chunks: &[Chunk],
    batch_size: usize,
) -> Option<EmbeddingIndex> {
    if chunks.is_empty() {
        warn!("no chunks to index");
        return None;
    }
    match embed_chunks(provider, chunks, batch_size).await {
        Ok(index) => {
            debug!(
                model = index.model(),
                dims = index.dims(),
                chunks = index.len(),
                "built embedding index"
            );
            Some(index)
        }
        Err(e) => {
            warn!(error = %e, "embedding index not built");
            None
        }
    }
}
