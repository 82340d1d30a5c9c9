//! Ingestion orchestration: `EMPTY → BUILDING → READY`.
//!
//! The [`IngestionOrchestrator`] owns the handle to the live [`VectorIndex`].
//! On first use it loads the persisted store; if the store needs a rebuild it
//! loads the corpus, chunks it, embeds the chunks, and persists the result
//! before serving. Transitions are serialized by an async mutex, so concurrent
//! callers never observe or build a half-written index. Once `READY`, the
//! index is shared read-only until an explicit [`reingest`](IngestionOrchestrator::reingest).

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, split_documents};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::loader::DocumentLoader;
use crate::store::IndexStore;

/// Observable lifecycle state of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// No index is loaded yet.
    Empty,
    /// The index is being built from the corpus.
    Building,
    /// The index is loaded and serving queries.
    Ready {
        /// Number of indexed chunks.
        entries: usize,
    },
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents (pages) loaded from the corpus.
    pub documents: usize,
    /// Chunks embedded and stored.
    pub chunks: usize,
}

enum IndexState {
    Empty,
    Building,
    Ready(Arc<VectorIndex>),
}

/// Drives loader → chunker → embedder → index → store, and hands out the
/// resulting index.
pub struct IngestionOrchestrator {
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn IndexStore>,
    state: RwLock<IndexState>,
    transition: Mutex<()>,
}

impl IngestionOrchestrator {
    /// Create an orchestrator in the `Empty` state.
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn IndexStore>,
    ) -> Self {
        Self {
            loader,
            chunker,
            embedder,
            store,
            state: RwLock::new(IndexState::Empty),
            transition: Mutex::new(()),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Current lifecycle state.
    pub fn status(&self) -> IndexStatus {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            IndexState::Empty => IndexStatus::Empty,
            IndexState::Building => IndexStatus::Building,
            IndexState::Ready(index) => IndexStatus::Ready { entries: index.len() },
        }
    }

    /// Return the live index, loading or building it on first use.
    ///
    /// A persisted store is loaded as-is. A store reporting
    /// [`StoreUnavailable`](crate::RagError::StoreUnavailable), or one whose
    /// vectors are not as wide as the embedder's, triggers a full build and
    /// persist.
    ///
    /// # Errors
    ///
    /// Propagates loader, embedding, and persist failures. The state returns to
    /// `Empty` and nothing is persisted.
    pub async fn ensure_ready(&self) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.ready_index() {
            return Ok(index);
        }

        let _guard = self.transition.lock().await;
        if let Some(index) = self.ready_index() {
            return Ok(index);
        }

        let loaded = self.store.load().await.and_then(|index| self.check_dimensions(index));
        match loaded {
            Ok(index) => {
                info!(store = %self.store.location(), entries = index.len(), "loaded persisted index");
                Ok(self.set_ready(index))
            }
            Err(e) if e.needs_rebuild() => {
                warn!(store = %self.store.location(), reason = %e, "index store unavailable, rebuilding");
                let (index, _) = self.rebuild_locked().await?;
                Ok(index)
            }
            Err(e) => Err(e),
        }
    }

    /// Rebuild the index from the corpus regardless of the current state.
    ///
    /// On failure the previously served index, if any, stays live and the
    /// persisted store is left untouched.
    pub async fn reingest(&self) -> Result<IngestReport> {
        let _guard = self.transition.lock().await;
        let (_, report) = self.rebuild_locked().await?;
        Ok(report)
    }

    fn check_dimensions(&self, index: VectorIndex) -> Result<VectorIndex> {
        let expected = self.embedder.dimensions();
        if !index.is_empty() && index.dimensions() != expected {
            return Err(RagError::StoreUnavailable {
                location: self.store.location(),
                reason: format!(
                    "stored vectors have {} dimensions, {} produces {expected}",
                    index.dimensions(),
                    self.embedder.name()
                ),
            });
        }
        Ok(index)
    }

    fn ready_index(&self) -> Option<Arc<VectorIndex>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            IndexState::Ready(index) => Some(Arc::clone(index)),
            _ => None,
        }
    }

    fn replace_state(&self, next: IndexState) -> IndexState {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *state, next)
    }

    fn set_ready(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let index = Arc::new(index);
        self.replace_state(IndexState::Ready(Arc::clone(&index)));
        index
    }

    /// Build and persist. Caller must hold `transition`.
    async fn rebuild_locked(&self) -> Result<(Arc<VectorIndex>, IngestReport)> {
        let previous = self.replace_state(IndexState::Building);

        match self.build_and_persist().await {
            Ok((index, report)) => Ok((self.set_ready(index), report)),
            Err(e) => {
                error!(store = %self.store.location(), error = %e, "ingestion failed");
                self.replace_state(match previous {
                    IndexState::Ready(index) => IndexState::Ready(index),
                    _ => IndexState::Empty,
                });
                Err(e)
            }
        }
    }

    async fn build_and_persist(&self) -> Result<(VectorIndex, IngestReport)> {
        let documents = self.loader.load().await?;
        if documents.is_empty() {
            warn!("corpus is empty, building an empty index");
        }

        let chunks = split_documents(self.chunker.as_ref(), &documents);
        let report = IngestReport { documents: documents.len(), chunks: chunks.len() };

        let index = VectorIndex::build(chunks, self.embedder.as_ref()).await?;
        self.store.persist(&index).await?;

        info!(documents = report.documents, chunks = report.chunks, "ingestion complete");
        Ok((index, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::RecursiveChunker;
    use crate::document::Document;
    use crate::mock::{KeywordEmbeddingProvider, StaticDocumentLoader};
    use crate::store::InMemoryIndexStore;

    struct Fixture {
        loader: Arc<StaticDocumentLoader>,
        embedder: Arc<KeywordEmbeddingProvider>,
        store: Arc<InMemoryIndexStore>,
    }

    impl Fixture {
        fn new(documents: Vec<Document>, embedder: KeywordEmbeddingProvider) -> Self {
            Self {
                loader: Arc::new(StaticDocumentLoader::new(documents)),
                embedder: Arc::new(embedder),
                store: Arc::new(InMemoryIndexStore::new("keyword")),
            }
        }

        fn orchestrator(&self) -> IngestionOrchestrator {
            IngestionOrchestrator::new(
                self.loader.clone(),
                Arc::new(RecursiveChunker::new(40, 10).unwrap()),
                self.embedder.clone(),
                self.store.clone(),
            )
        }
    }

    fn corpus() -> Vec<Document> {
        vec![Document::new("hr.pdf", "Leave policy allows 20 days annually. Sick leave is separate.")]
    }

    #[tokio::test]
    async fn missing_store_builds_and_persists() {
        let fixture = Fixture::new(corpus(), KeywordEmbeddingProvider::new(["leave", "days"]));
        let orchestrator = fixture.orchestrator();
        assert_eq!(orchestrator.status(), IndexStatus::Empty);

        let index = orchestrator.ensure_ready().await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(orchestrator.status(), IndexStatus::Ready { entries: 2 });
        assert!(fixture.store.exists().await);
        assert_eq!(fixture.loader.loads(), 1);
    }

    #[tokio::test]
    async fn existing_store_is_loaded_without_rebuild() {
        let fixture = Fixture::new(corpus(), KeywordEmbeddingProvider::new(["leave", "days"]));
        fixture.orchestrator().ensure_ready().await.unwrap();

        let second = fixture.orchestrator();
        let index = second.ensure_ready().await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(fixture.loader.loads(), 1);
    }

    #[tokio::test]
    async fn stored_vectors_of_another_width_trigger_rebuild() {
        let fixture = Fixture::new(corpus(), KeywordEmbeddingProvider::new(["leave", "days"]));
        fixture.orchestrator().ensure_ready().await.unwrap();

        let wider = IngestionOrchestrator::new(
            fixture.loader.clone(),
            Arc::new(RecursiveChunker::new(40, 10).unwrap()),
            Arc::new(KeywordEmbeddingProvider::new(["leave", "days", "sick"])),
            fixture.store.clone(),
        );
        let index = wider.ensure_ready().await.unwrap();
        assert_eq!(index.dimensions(), 3);
        assert_eq!(fixture.loader.loads(), 2);
        assert_eq!(fixture.store.manifest().await.unwrap().dimensions, 3);
    }

    #[tokio::test]
    async fn ready_index_is_reused() {
        let fixture = Fixture::new(corpus(), KeywordEmbeddingProvider::new(["leave"]));
        let orchestrator = fixture.orchestrator();
        let first = orchestrator.ensure_ready().await.unwrap();
        let second = orchestrator.ensure_ready().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn empty_corpus_builds_empty_index() {
        let fixture = Fixture::new(Vec::new(), KeywordEmbeddingProvider::new(["leave"]));
        let orchestrator = fixture.orchestrator();

        let report = orchestrator.reingest().await.unwrap();
        assert_eq!(report, IngestReport { documents: 0, chunks: 0 });
        assert_eq!(orchestrator.status(), IndexStatus::Ready { entries: 0 });
        assert!(fixture.store.exists().await);
    }

    #[tokio::test]
    async fn failed_build_leaves_no_store_and_returns_to_empty() {
        let fixture =
            Fixture::new(corpus(), KeywordEmbeddingProvider::new(["leave"]).failing("quota"));
        let orchestrator = fixture.orchestrator();

        let err = orchestrator.ensure_ready().await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
        assert_eq!(orchestrator.status(), IndexStatus::Empty);
        assert!(!fixture.store.exists().await);
    }

    #[tokio::test]
    async fn reingest_replaces_a_ready_index() {
        let fixture = Fixture::new(corpus(), KeywordEmbeddingProvider::new(["leave"]));
        let orchestrator = fixture.orchestrator();
        let before = orchestrator.ensure_ready().await.unwrap();

        let report = orchestrator.reingest().await.unwrap();
        assert_eq!(report.chunks, 2);
        let after = orchestrator.ensure_ready().await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(fixture.loader.loads(), 2);
    }

    #[tokio::test]
    async fn concurrent_first_use_builds_once() {
        let fixture = Fixture::new(corpus(), KeywordEmbeddingProvider::new(["leave"]));
        let orchestrator = Arc::new(fixture.orchestrator());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move { orchestrator.ensure_ready().await.map(|i| i.len()) })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 2);
        }
        assert_eq!(fixture.loader.loads(), 1);
    }
}
