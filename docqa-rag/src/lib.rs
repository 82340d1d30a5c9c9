//! # docqa-rag
//!
//! Retrieval-augmented question answering over a fixed corpus of PDF documents.
//!
//! ## Overview
//!
//! At build time the corpus is split into overlapping chunks, each chunk is
//! embedded, and the resulting [`VectorIndex`] is persisted to an
//! [`IndexStore`]. At query time a question is embedded, the nearest chunks are
//! retrieved, packed into a `[S1]`, `[S2]`... labelled context block, and a
//! [`LanguageModel`] writes a cited answer from that context only.
//!
//! - [`RecursiveChunker`] - separator-aware chunking with overlap
//! - [`VectorIndex`] - cosine-similarity index built from an [`EmbeddingProvider`]
//! - [`DirectoryIndexStore`] - atomic on-disk persistence
//! - [`Retriever`], [`ContextAssembler`], [`AnswerGenerator`] - the query path
//! - [`IngestionOrchestrator`] - the `EMPTY → BUILDING → READY` lifecycle
//! - [`RagPipeline`] - all of the above behind `answer(question)`
//!
//! ## Features
//!
//! - `openai` (default) - OpenAI-compatible embedding and chat clients
//! - `pdf` (default) - [`PdfDirectoryLoader`] for page-level PDF text
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
//! use docqa_rag::{PdfDirectoryLoader, RagConfig, RagPipeline};
//!
//! let config = RagConfig::default();
//! let pipeline = RagPipeline::builder()
//!     .loader(Arc::new(PdfDirectoryLoader::new(&config.docs_dir)))
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
//!     .language_model(Arc::new(OpenAIChatModel::from_env()?))
//!     .config(config)
//!     .build()?;
//!
//! println!("{}", pipeline.answer_text("How many leave days do I get?").await?);
//! ```

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filestore;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod loader;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retrieval;
pub mod store;

pub use chunking::{Chunker, RecursiveChunker, split_documents};
pub use config::{RagConfig, RagConfigBuilder};
pub use context::{AssembledContext, Citation, ContextAssembler};
pub use document::{Chunk, ChunkMetadata, Document, IndexEntry, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use filestore::DirectoryIndexStore;
pub use generation::{AnswerGenerator, LanguageModel};
pub use index::VectorIndex;
pub use ingestion::{IndexStatus, IngestReport, IngestionOrchestrator};
#[cfg(feature = "pdf")]
pub use loader::PdfDirectoryLoader;
pub use loader::{DocumentLoader, discover_pdf_files};
pub use pipeline::{Answer, NO_CONTEXT_MESSAGE, RagPipeline, RagPipelineBuilder};
pub use retrieval::Retriever;
pub use store::{InMemoryIndexStore, IndexStore, StoreManifest};
