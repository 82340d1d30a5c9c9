//! Persistence seam for the vector index.
//!
//! An [`IndexStore`] saves and restores a [`VectorIndex`]. A missing,
//! unreadable or incompatible store loads as
//! [`RagError::StoreUnavailable`], which callers treat as "needs rebuild".
//!
//! [`InMemoryIndexStore`] keeps the index in process memory and lets tests
//! simulate both "store exists" and "store missing" without touching disk;
//! [`DirectoryIndexStore`](crate::filestore::DirectoryIndexStore) is the
//! on-disk implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Version of the persisted layout. Stores written with another version must
/// be rebuilt.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Description of a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreManifest {
    /// Layout version, see [`STORE_FORMAT_VERSION`].
    pub format_version: u32,
    /// Embedding model that produced the stored vectors.
    pub embedding_model: String,
    /// Vector dimensionality (0 for an empty index).
    pub dimensions: usize,
    /// Number of stored entries.
    pub entry_count: usize,
    /// When the index was persisted.
    pub built_at: DateTime<Utc>,
}

impl StoreManifest {
    /// Describe `index` as produced by `embedding_model`, timestamped now.
    pub fn describe(index: &VectorIndex, embedding_model: &str) -> Self {
        Self {
            format_version: STORE_FORMAT_VERSION,
            embedding_model: embedding_model.to_string(),
            dimensions: index.dimensions(),
            entry_count: index.len(),
            built_at: Utc::now(),
        }
    }

    /// Check that a store with this manifest can serve `embedding_model` queries.
    pub(crate) fn check_compatible(&self, location: &str, embedding_model: &str) -> Result<()> {
        if self.format_version != STORE_FORMAT_VERSION {
            return Err(RagError::StoreUnavailable {
                location: location.to_string(),
                reason: format!(
                    "format version {} is not supported (expected {STORE_FORMAT_VERSION})",
                    self.format_version
                ),
            });
        }
        if self.embedding_model != embedding_model {
            return Err(RagError::StoreUnavailable {
                location: location.to_string(),
                reason: format!(
                    "built with embedding model '{}', configured model is '{embedding_model}'",
                    self.embedding_model
                ),
            });
        }
        Ok(())
    }
}

/// A storage backend for a persisted [`VectorIndex`].
///
/// `persist` must never leave a partially written store behind: either the
/// previous contents survive or the new index is fully in place.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Human-readable location, used in logs and errors.
    fn location(&self) -> String;

    /// Whether a persisted index is present.
    async fn exists(&self) -> bool;

    /// Replace the stored index with `index`.
    async fn persist(&self, index: &VectorIndex) -> Result<()>;

    /// Load the stored index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreUnavailable`] if nothing usable is stored.
    async fn load(&self) -> Result<VectorIndex>;

    /// Read the manifest of the stored index.
    async fn manifest(&self) -> Result<StoreManifest>;
}

/// An [`IndexStore`] held in process memory.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryIndexStore, IndexStore};
///
/// let store = InMemoryIndexStore::new("text-embedding-3-large");
/// assert!(!store.exists().await);
/// ```
#[derive(Debug)]
pub struct InMemoryIndexStore {
    embedding_model: String,
    slot: RwLock<Option<(StoreManifest, VectorIndex)>>,
}

impl InMemoryIndexStore {
    /// Create an empty store for vectors from `embedding_model`.
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self { embedding_model: embedding_model.into(), slot: RwLock::new(None) }
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn exists(&self) -> bool {
        self.slot.read().await.is_some()
    }

    async fn persist(&self, index: &VectorIndex) -> Result<()> {
        let manifest = StoreManifest::describe(index, &self.embedding_model);
        *self.slot.write().await = Some((manifest, index.clone()));
        Ok(())
    }

    async fn load(&self) -> Result<VectorIndex> {
        let slot = self.slot.read().await;
        let (manifest, index) = slot.as_ref().ok_or_else(|| RagError::StoreUnavailable {
            location: self.location(),
            reason: "no index has been persisted".to_string(),
        })?;
        manifest.check_compatible(&self.location(), &self.embedding_model)?;
        Ok(index.clone())
    }

    async fn manifest(&self) -> Result<StoreManifest> {
        let slot = self.slot.read().await;
        slot.as_ref().map(|(manifest, _)| manifest.clone()).ok_or_else(|| {
            RagError::StoreUnavailable {
                location: self.location(),
                reason: "no index has been persisted".to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Chunk, ChunkMetadata, IndexEntry};
    use std::collections::HashMap;

    fn sample_index() -> VectorIndex {
        VectorIndex::from_entries(vec![IndexEntry {
            chunk: Chunk {
                id: "a.pdf#p1-0".to_string(),
                text: "Leave policy".to_string(),
                metadata: ChunkMetadata {
                    source_name: "a.pdf".to_string(),
                    page_number: Some(1),
                    chunk_index: 0,
                    start_offset: 0,
                    extra: HashMap::new(),
                },
            },
            embedding: vec![0.5, 0.25],
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn missing_index_needs_rebuild() {
        let store = InMemoryIndexStore::new("embed");
        assert!(!store.exists().await);
        let err = store.load().await.unwrap_err();
        assert!(err.needs_rebuild());
    }

    #[tokio::test]
    async fn persist_then_load_returns_same_index() {
        let store = InMemoryIndexStore::new("embed");
        let index = sample_index();
        store.persist(&index).await.unwrap();

        assert!(store.exists().await);
        assert_eq!(store.load().await.unwrap(), index);
        let manifest = store.manifest().await.unwrap();
        assert_eq!(manifest.entry_count, 1);
        assert_eq!(manifest.dimensions, 2);
        assert_eq!(manifest.embedding_model, "embed");
    }

    #[test]
    fn manifest_from_other_model_is_incompatible() {
        let manifest = StoreManifest::describe(&sample_index(), "old-model");
        let err = manifest.check_compatible("store", "new-model").unwrap_err();
        assert!(err.needs_rebuild());
        assert!(manifest.check_compatible("store", "old-model").is_ok());
    }
}
