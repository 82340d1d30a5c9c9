//! Question-to-chunks retrieval.

use std::sync::Arc;

use tracing::debug;

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Embeds a question and looks up its nearest chunks in a [`VectorIndex`].
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::Retriever;
///
/// let retriever = Retriever::new(embedder, index);
/// let results = retriever.retrieve("How many leave days?", 4).await?;
/// ```
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    min_score: Option<f32>,
}

impl Retriever {
    /// Create a retriever over `index`. No score floor is applied.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index, min_score: None }
    }

    /// Drop results scoring below `min_score`, when set.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Return up to `k` chunks ranked by descending similarity to `question`.
    ///
    /// An empty index returns an empty result without calling the embedding
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `k == 0`, and propagates
    /// embedding failures.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::InvalidConfiguration("k must be at least 1".to_string()));
        }
        if self.index.is_empty() {
            debug!("index is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(question).await?;
        let mut results = self.index.query(&query_vector, k)?;
        if let Some(min_score) = self.min_score {
            results.retain(|r| r.score >= min_score);
        }

        debug!(provider = self.embedder.name(), k, result_count = results.len(), "retrieved chunks");
        Ok(results)
    }
}
