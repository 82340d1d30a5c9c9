//! Question-answering pipeline.
//!
//! [`RagPipeline`] composes the ingestion orchestrator with query-time
//! retrieval, context assembly, and answer generation. Each question is
//! answered independently: embed → retrieve → assemble → generate.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagConfig, RagPipeline, PdfDirectoryLoader};
//!
//! let config = RagConfig::default();
//! let pipeline = RagPipeline::builder()
//!     .loader(Arc::new(PdfDirectoryLoader::new(&config.docs_dir)))
//!     .config(config)
//!     .embedding_provider(Arc::new(my_embedder))
//!     .language_model(Arc::new(my_model))
//!     .build()?;
//!
//! let answer = pipeline.answer("How many leave days do I get?").await?;
//! println!("{}", answer.text);
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::context::{Citation, ContextAssembler};
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::filestore::DirectoryIndexStore;
use crate::generation::{AnswerGenerator, LanguageModel};
use crate::ingestion::{IndexStatus, IngestReport, IngestionOrchestrator};
use crate::loader::DocumentLoader;
use crate::retrieval::Retriever;
use crate::store::IndexStore;

/// Reply used when retrieval finds nothing to ground an answer on.
pub const NO_CONTEXT_MESSAGE: &str =
    "I couldn't find relevant context in the documents to answer that.";

/// An answer with the sources its `[Sn]` markers refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The answer text, or [`NO_CONTEXT_MESSAGE`].
    pub text: String,
    /// Sources in marker order. Empty when no context was found.
    pub citations: Vec<Citation>,
}

impl Answer {
    fn no_context() -> Self {
        Self { text: NO_CONTEXT_MESSAGE.to_string(), citations: Vec::new() }
    }

    /// Whether the answer was produced without any retrieved context.
    pub fn is_no_context(&self) -> bool {
        self.citations.is_empty()
    }
}

/// The question-answering pipeline. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    orchestrator: IngestionOrchestrator,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the index store.
    pub fn index_store(&self) -> &Arc<dyn IndexStore> {
        self.orchestrator.store()
    }

    /// Current index lifecycle state.
    pub fn status(&self) -> IndexStatus {
        self.orchestrator.status()
    }

    /// Load or build the index so the first question does not pay for it.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.orchestrator.ensure_ready().await.map(|_| ())
    }

    /// Rebuild the persisted index from the corpus.
    pub async fn reingest(&self) -> Result<IngestReport> {
        self.orchestrator.reingest().await
    }

    /// Retrieve the top `top_k` chunks for `question`.
    ///
    /// # Errors
    ///
    /// Propagates ingestion failures on first use and embedding failures.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let index = self.orchestrator.ensure_ready().await?;
        Retriever::new(Arc::clone(&self.embedding_provider), index)
            .with_min_score(self.config.similarity_threshold)
            .retrieve(question, self.config.top_k)
            .await
    }

    /// Answer `question` from the corpus.
    ///
    /// Returns [`NO_CONTEXT_MESSAGE`] without calling the language model when
    /// the question is blank or nothing relevant is retrieved.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] or [`RagError::GenerationError`]
    /// when an external service fails. Callers should surface these as
    /// "answer unavailable" and keep serving.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(Answer::no_context());
        }

        let results = self.retrieve(question).await?;
        let Some(context) = self.assembler.assemble(&results) else {
            info!(result_count = 0, "no relevant context");
            return Ok(Answer::no_context());
        };

        let text = self.generator.generate(question, &context.text).await.map_err(|e| {
            error!(error = %e, "answer generation failed");
            e
        })?;

        info!(citation_count = context.citations.len(), "answered question");
        Ok(Answer { text, citations: context.citations })
    }

    /// Answer `question`, returning only the text.
    pub async fn answer_text(&self, question: &str) -> Result<String> {
        self.answer(question).await.map(|answer| answer.text)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, `language_model` and `loader` are required.
/// The index store defaults to a [`DirectoryIndexStore`] at
/// [`RagConfig::store_dir`] and the chunker to a [`RecursiveChunker`] sized
/// from the config.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    language_model: Option<Arc<dyn LanguageModel>>,
    loader: Option<Arc<dyn DocumentLoader>>,
    index_store: Option<Arc<dyn IndexStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the language model.
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Set the corpus loader.
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Override the index store.
    pub fn index_store(mut self, store: Arc<dyn IndexStore>) -> Self {
        self.index_store = Some(store);
        self
    }

    /// Override the chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Validate and build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if a required component is
    /// missing or the configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.ok_or_else(|| missing("config"))?;
        config.validate()?;
        let embedding_provider =
            self.embedding_provider.ok_or_else(|| missing("embedding_provider"))?;
        let language_model = self.language_model.ok_or_else(|| missing("language_model"))?;
        let loader = self.loader.ok_or_else(|| missing("loader"))?;

        let index_store = match self.index_store {
            Some(store) => store,
            None => Arc::new(DirectoryIndexStore::new(
                config.store_dir.clone(),
                config.embedding_model.clone(),
            )),
        };
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::from_config(&config)?),
        };

        let orchestrator = IngestionOrchestrator::new(
            loader,
            chunker,
            Arc::clone(&embedding_provider),
            index_store,
        );

        Ok(RagPipeline {
            assembler: ContextAssembler::new(config.max_chars_per_chunk),
            generator: AnswerGenerator::new(language_model).with_temperature(config.temperature),
            config,
            embedding_provider,
            orchestrator,
        })
    }
}

fn missing(component: &str) -> RagError {
    RagError::InvalidConfiguration(format!("{component} is required"))
}
