//! In-memory vector index with cosine-similarity search.
//!
//! A [`VectorIndex`] is built once from a corpus of chunks and is immutable
//! afterwards, so a shared `Arc<VectorIndex>` serves concurrent queries without
//! locking. Persistence lives behind the [`IndexStore`](crate::store::IndexStore)
//! trait.

use tracing::debug;

use crate::document::{Chunk, IndexEntry, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Number of chunks sent to the embedding provider per request.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;

/// Chunk embeddings plus their text and metadata, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed every chunk and store the results.
    ///
    /// Chunks are embedded in batches of [`DEFAULT_EMBED_BATCH_SIZE`].
    ///
    /// # Errors
    ///
    /// Propagates the provider's error unchanged, and returns
    /// [`RagError::IndexError`] if the provider returns the wrong number of
    /// vectors or vectors of inconsistent dimensionality.
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        Self::build_batched(chunks, embedder, DEFAULT_EMBED_BATCH_SIZE).await
    }

    /// Like [`build`](Self::build) with an explicit batch size.
    pub async fn build_batched(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self> {
        let batch_size = batch_size.max(1);
        let mut index = Self::new();
        let mut pending = chunks.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(batch_size).collect();
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(RagError::IndexError(format!(
                    "embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }
            debug!(provider = embedder.name(), batch_size = batch.len(), "embedded chunk batch");

            for (chunk, embedding) in batch.into_iter().zip(embeddings) {
                index.insert(IndexEntry { chunk, embedding })?;
            }
        }

        Ok(index)
    }

    /// Rebuild an index from previously persisted entries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if entries disagree on dimensionality.
    pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self> {
        let mut index = Self::new();
        for entry in entries {
            index.insert(entry)?;
        }
        Ok(index)
    }

    fn insert(&mut self, entry: IndexEntry) -> Result<()> {
        if entry.embedding.is_empty() {
            return Err(RagError::IndexError(format!(
                "chunk '{}' has an empty embedding",
                entry.chunk.id
            )));
        }
        if self.entries.is_empty() {
            self.dimensions = entry.embedding.len();
        } else if entry.embedding.len() != self.dimensions {
            return Err(RagError::IndexError(format!(
                "chunk '{}' has {} dimensions, index has {}",
                entry.chunk.id,
                entry.embedding.len(),
                self.dimensions
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Return the `k` entries most similar to `query_vector`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores keep
    /// insertion order. An empty index yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `k == 0`, and
    /// [`RagError::IndexError`] if the query dimensionality does not match a
    /// non-empty index.
    pub fn query(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::InvalidConfiguration("k must be at least 1".to_string()));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimensions {
            return Err(RagError::IndexError(format!(
                "query has {} dimensions, index has {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(&entry.embedding, query_vector)))
            .collect();

        // Stable sort keeps earlier-inserted entries ahead on ties.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimensionality, or 0 for an empty index.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Stored entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}
