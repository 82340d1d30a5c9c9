//! Context assembly: turns ranked chunks into a citation-tagged prompt block.
//!
//! Each result becomes one block labelled `[S{n}]`, where `n` is the 1-based
//! rank of the result in this call. The same ordinal appears in the returned
//! [`Citation`] list so a caller can map markers in the answer back to sources.

use serde::Serialize;

use crate::document::SearchResult;

/// Default per-chunk truncation length in characters.
pub const DEFAULT_MAX_CHARS_PER_CHUNK: usize = 750;

/// Source attribution for one `[Sn]` marker.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Citation {
    /// 1-based rank of the result.
    pub ordinal: usize,
    /// The marker as it appears in the context, e.g. `[S1]`.
    pub marker: String,
    /// Source file name.
    pub source_name: String,
    /// Source page, when known.
    pub page_number: Option<u32>,
    /// Identifier of the cited chunk.
    pub chunk_id: String,
    /// Similarity score of the cited chunk.
    pub score: f32,
}

/// The context block handed to the language model plus its citation map.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    /// Blocks of the form `[S{n}] from {source}:\n{text}\n`, blank-line separated.
    pub text: String,
    /// One citation per block, in block order.
    pub citations: Vec<Citation>,
}

/// Formats retrieval results into a bounded, citation-tagged context.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars_per_chunk: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS_PER_CHUNK)
    }
}

impl ContextAssembler {
    /// Create an assembler truncating each chunk to `max_chars_per_chunk`.
    pub fn new(max_chars_per_chunk: usize) -> Self {
        Self { max_chars_per_chunk }
    }

    /// Build the context for `results`, in rank order.
    ///
    /// Returns `None` when there are no results, so the caller can skip the
    /// language model entirely.
    pub fn assemble(&self, results: &[SearchResult]) -> Option<AssembledContext> {
        if results.is_empty() {
            return None;
        }

        let mut blocks = Vec::with_capacity(results.len());
        let mut citations = Vec::with_capacity(results.len());

        for (i, result) in results.iter().enumerate() {
            let ordinal = i + 1;
            let marker = format!("[S{ordinal}]");
            let metadata = &result.chunk.metadata;
            let normalized = normalize_whitespace(&result.chunk.text);
            let preview = truncate_chars(&normalized, self.max_chars_per_chunk);

            blocks.push(format!("{marker} from {}:\n{preview}\n", metadata.source_name));
            citations.push(Citation {
                ordinal,
                marker,
                source_name: metadata.source_name.clone(),
                page_number: metadata.page_number,
                chunk_id: result.chunk.id.clone(),
                score: result.score,
            });
        }

        Some(AssembledContext { text: blocks.join("\n"), citations })
    }
}

/// Collapse every whitespace run (newlines included) into a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters.
///
/// A cut that lands mid-word snaps back to the preceding space when that space
/// lies in the second half of the allowed length; otherwise the cut is exact.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    let Some((cut, next)) = text.char_indices().nth(max_chars) else {
        return text;
    };
    let head = &text[..cut];
    if next.is_whitespace() {
        return head.trim_end();
    }
    match head.rfind(char::is_whitespace) {
        Some(space) if head[..space].chars().count() >= max_chars / 2 => head[..space].trim_end(),
        _ => head,
    }
}
