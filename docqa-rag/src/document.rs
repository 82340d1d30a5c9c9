//! Data types for documents, chunks, index entries, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Text extracted from one source file (typically one PDF page).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// File name of the source, used verbatim as the citation label.
    pub source_name: String,
    /// 1-based page number within the source, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// The extracted text.
    pub text: String,
    /// Additional key-value metadata carried onto every chunk.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no page number and no extra metadata.
    pub fn new(source_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            page_number: None,
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    /// Set the page number.
    pub fn with_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Attribution carried by every [`Chunk`], inherited from its parent [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// File name of the source document.
    pub source_name: String,
    /// Page number of the source document, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Zero-based position of the chunk within its document.
    pub chunk_index: usize,
    /// Character offset of the chunk's first character in the document text.
    pub start_offset: usize,
    /// Open-ended metadata copied from the document.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

/// A contiguous, length-bounded slice of a [`Document`]'s text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Identifier unique within a corpus: `{source}#p{page}-{chunk_index}`.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Source attribution.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Build the chunk identifier for a position within a document.
    pub fn make_id(source_name: &str, page_number: Option<u32>, chunk_index: usize) -> String {
        match page_number {
            Some(page) => format!("{source_name}#p{page}-{chunk_index}"),
            None => format!("{source_name}-{chunk_index}"),
        }
    }
}

/// A [`Chunk`] stored in the vector index together with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// The stored chunk.
    pub chunk: Chunk,
    /// The chunk's embedding vector.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity with the query (higher is more relevant).
    pub score: f32,
}
