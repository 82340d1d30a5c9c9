//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting a corpus or answering a question.
#[derive(Debug, Error)]
pub enum RagError {
    /// The persisted index is missing, unreadable, or incompatible.
    ///
    /// Callers treat this as "needs rebuild", never as a fatal condition.
    #[error("Index store unavailable at {location}: {reason}")]
    StoreUnavailable {
        /// The store location that was checked.
        location: String,
        /// Why the store could not be used.
        reason: String,
    },

    /// Writing the index to its store failed.
    #[error("Index store error at {location}: {message}")]
    StoreError {
        /// The store location being written.
        location: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model failed to produce an answer.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The language model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A corpus file could not be discovered or read.
    #[error("Failed to load {path}: {message}")]
    LoaderError {
        /// The file or directory that failed.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index was given inconsistent input.
    #[error("Index error: {0}")]
    IndexError(String),
}

impl RagError {
    /// Whether this error means the persisted index must be rebuilt.
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, RagError::StoreUnavailable { .. })
    }

    /// Whether this error came from an external embedding or generation service.
    pub fn is_service_error(&self) -> bool {
        matches!(self, RagError::EmbeddingError { .. } | RagError::GenerationError { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_unavailable_needs_rebuild() {
        let unavailable =
            RagError::StoreUnavailable { location: "store".into(), reason: "missing".into() };
        let write_failure = RagError::StoreError { location: "store".into(), message: "io".into() };
        assert!(unavailable.needs_rebuild());
        assert!(!write_failure.needs_rebuild());
        assert!(!RagError::InvalidConfiguration("k".into()).needs_rebuild());
    }

    #[test]
    fn service_errors_are_distinguishable() {
        let embed = RagError::EmbeddingError { provider: "OpenAI".into(), message: "quota".into() };
        let generate =
            RagError::GenerationError { provider: "OpenAI".into(), message: "timeout".into() };
        assert!(embed.is_service_error());
        assert!(generate.is_service_error());
        assert!(!RagError::IndexError("dims".into()).is_service_error());
        assert_eq!(embed.to_string(), "Embedding error (OpenAI): quota");
    }
}
