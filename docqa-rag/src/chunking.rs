//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text at the strongest natural boundary available within the size
//! budget: paragraph break, line break, sentence end, then any whitespace,
//! falling back to a hard cut at `chunk_size` characters.
//!
//! Sizes and offsets are counted in Unicode scalar values, never bytes.

use crate::config::RagConfig;
use crate::document::{Chunk, ChunkMetadata, Document};
use crate::error::{RagError, Result};

/// Literal boundaries tried in priority order before falling back to any
/// whitespace character.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", "? ", "! "];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Split every document with `chunker`, preserving document order.
pub fn split_documents(chunker: &dyn Chunker, documents: &[Document]) -> Vec<Chunk> {
    documents.iter().flat_map(|document| chunker.chunk(document)).collect()
}

/// Splits text hierarchically with character overlap between neighbours.
///
/// Every chunk holds at most `chunk_size` characters. Consecutive chunks of a
/// document share up to `chunk_overlap` characters: the next chunk begins at
/// the earliest word boundary inside the last `chunk_overlap` characters of the
/// previous cut, or exactly `chunk_overlap` characters back when that stretch
/// has no word boundary. Leading and trailing whitespace is trimmed from each
/// chunk.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1200, 200)?;
/// let chunks = chunker.split(&documents);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<Vec<char>>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] unless `chunk_size > chunk_overlap`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_overlap >= chunk_size {
            return Err(RagError::InvalidConfiguration(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: SEPARATORS.iter().map(|s| s.chars().collect()).collect(),
        })
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split a sequence of documents into chunks.
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        split_documents(self, documents)
    }

    /// Split raw text into `(start_offset, text)` pieces.
    fn split_text(&self, text: &str) -> Vec<(usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        let mut pieces = Vec::new();
        let mut start = skip_whitespace(&chars, 0);

        while start < chars.len() {
            if chars.len() - start <= self.chunk_size {
                pieces.push((start, collect_trimmed(&chars[start..])));
                break;
            }

            let end = self.find_cut(&chars, start);
            pieces.push((start, collect_trimmed(&chars[start..end])));

            if chars[end..].iter().all(|c| c.is_whitespace()) {
                break;
            }
            start = skip_whitespace(&chars, self.overlap_start(&chars, start, end));
        }

        pieces
    }

    /// Pick the end (exclusive) of the chunk beginning at `start`.
    ///
    /// The cut must land more than `chunk_overlap` characters past `start` so
    /// the following chunk always advances beyond this one.
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let limit = start + self.chunk_size;
        let min_end = start + self.chunk_overlap + 1;
        let window = &chars[start..limit];

        for separator in &self.separators {
            if let Some(end) = last_cut_after(window, separator) {
                if start + end >= min_end {
                    return start + end;
                }
            }
        }

        if let Some(pos) = window.iter().rposition(|c| c.is_whitespace()) {
            if start + pos + 1 >= min_end {
                return start + pos + 1;
            }
        }

        limit
    }

    /// Where the chunk following `[start, end)` begins.
    fn overlap_start(&self, chars: &[char], start: usize, end: usize) -> usize {
        if self.chunk_overlap == 0 {
            return end;
        }
        let floor = end.saturating_sub(self.chunk_overlap).max(start + 1);
        (floor..end)
            .find(|&pos| chars[pos - 1].is_whitespace() && !chars[pos].is_whitespace())
            .unwrap_or(floor)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }

        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start_offset, text))| Chunk {
                id: Chunk::make_id(&document.source_name, document.page_number, chunk_index),
                text,
                metadata: ChunkMetadata {
                    source_name: document.source_name.clone(),
                    page_number: document.page_number,
                    chunk_index,
                    start_offset,
                    extra: document.metadata.clone(),
                },
            })
            .collect()
    }
}

/// End offset (exclusive) of the last occurrence of `separator` in `window`.
fn last_cut_after(window: &[char], separator: &[char]) -> Option<usize> {
    if separator.is_empty() || window.len() < separator.len() {
        return None;
    }
    (0..=window.len() - separator.len())
        .rev()
        .find(|&i| &window[i..i + separator.len()] == separator)
        .map(|i| i + separator.len())
}

fn skip_whitespace(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}

fn collect_trimmed(chars: &[char]) -> String {
    let text: String = chars.iter().collect();
    text.trim().to_string()
}
