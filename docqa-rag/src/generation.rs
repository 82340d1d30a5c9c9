//! Answer generation through an external language model.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// Instruction sent as the system turn of every completion request.
pub const SYSTEM_PROMPT: &str = "You are a careful assistant answering questions about a fixed \
set of documents. Answer using only the information in the supplied context. Every claim must \
cite its source with the bracketed marker that labels the context passage it came from, such as \
[S1] or [S2]; cite several markers when several passages support a claim. Never invent markers \
that do not appear in the context. If the context does not contain the answer, say that the \
documents do not cover it instead of guessing.";

/// A chat-completion service.
///
/// Implementations must return [`RagError::GenerationError`] for service
/// failures so callers can report "answer unavailable" rather than crash.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a two-turn conversation and return the reply text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String>;

    /// Model identifier, used in logs and error messages.
    fn name(&self) -> &str;
}

/// Build the user turn: the question followed by the context block verbatim.
pub fn build_user_prompt(question: &str, context_text: &str) -> String {
    format!("Question: {question}\n\nContext:\n{context_text}")
}

/// Combines the system instruction, the question, and assembled context into
/// a single completion request.
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
}

impl AnswerGenerator {
    /// Create a generator that samples at temperature 0 for reproducibility.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model, temperature: 0.0 }
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Ask the model to answer `question` from `context_text`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`] if the model fails or returns an
    /// empty completion.
    pub async fn generate(&self, question: &str, context_text: &str) -> Result<String> {
        let user_prompt = build_user_prompt(question, context_text);
        debug!(model = self.model.name(), prompt_len = user_prompt.len(), "requesting completion");

        let reply = self
            .model
            .complete(SYSTEM_PROMPT, &user_prompt, self.temperature)
            .await
            .map_err(|e| {
                error!(model = self.model.name(), error = %e, "completion failed");
                match e {
                    RagError::GenerationError { .. } => e,
                    other => RagError::GenerationError {
                        provider: self.model.name().to_string(),
                        message: other.to_string(),
                    },
                }
            })?;

        let reply = reply.trim();
        if reply.is_empty() {
            error!(model = self.model.name(), "completion was empty");
            return Err(RagError::GenerationError {
                provider: self.model.name().to_string(),
                message: "model returned an empty completion".to_string(),
            });
        }
        Ok(reply.to_string())
    }
}
