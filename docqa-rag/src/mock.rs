//! Deterministic stand-ins for the external services.
//!
//! These are used by the test suites and are handy for running the pipeline
//! without network access.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::LanguageModel;
use crate::loader::DocumentLoader;

/// Embeds text as keyword counts over a fixed vocabulary.
///
/// Dimension `i` counts case-insensitive whole-word occurrences of
/// `vocabulary[i]`, ignoring surrounding punctuation. Texts sharing more
/// keywords score higher under cosine similarity.
#[derive(Debug)]
pub struct KeywordEmbeddingProvider {
    vocabulary: Vec<String>,
    embed_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    failure: Option<String>,
}

impl KeywordEmbeddingProvider {
    /// Create a provider over `vocabulary`.
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vocabulary: vocabulary.into_iter().map(|w| w.into().to_lowercase()).collect(),
            embed_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            failure: None,
        }
    }

    /// Make every call fail with [`RagError::EmbeddingError`].
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of single-text `embed` calls made so far.
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Number of `embed_batch` calls made so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(message) = &self.failure {
            return Err(RagError::EmbeddingError {
                provider: "keyword".to_string(),
                message: message.clone(),
            });
        }
        let mut vector = vec![0.0f32; self.vocabulary.len()];
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if let Some(slot) = self.vocabulary.iter().position(|v| *v == word) {
                vector[slot] += 1.0;
            }
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.vectorize(text)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|text| self.vectorize(text)).collect()
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// A completion request captured by [`MockLanguageModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// The system turn.
    pub system_prompt: String,
    /// The user turn.
    pub user_prompt: String,
    /// Requested sampling temperature.
    pub temperature: f32,
}

/// A language model that returns scripted replies and records every request.
#[derive(Debug)]
pub struct MockLanguageModel {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLanguageModel {
    /// Always reply with `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self::with_replies([Ok(reply.into())])
    }

    /// Always fail with [`RagError::GenerationError`] carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_replies([Err(message.into())])
    }

    /// Answer successive requests with `replies` in order; the last one
    /// repeats once the script runs out. `Err` entries fail with
    /// [`RagError::GenerationError`].
    pub fn with_replies<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<String, String>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        self.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(
            RecordedRequest {
                system_prompt: system_prompt.to_string(),
                user_prompt: user_prompt.to_string(),
                temperature,
            },
        );
        let reply = {
            let mut replies = self.replies.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if replies.len() > 1 { replies.pop_front() } else { replies.front().cloned() }
        };
        reply
            .unwrap_or_else(|| Err("no reply scripted".to_string()))
            .map_err(|message| RagError::GenerationError {
                provider: self.name().to_string(),
                message,
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A loader that returns a fixed set of documents.
#[derive(Debug, Default)]
pub struct StaticDocumentLoader {
    documents: Vec<Document>,
    loads: AtomicUsize,
}

impl StaticDocumentLoader {
    /// Serve `documents` on every load.
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents, loads: AtomicUsize::new(0) }
    }

    /// Number of times the corpus was loaded.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentLoader for StaticDocumentLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.clone())
    }
}
