//! Property tests for the recursive chunker.

use docqa_rag::{Chunk, Chunker, Document, RecursiveChunker};
use proptest::prelude::*;

/// Prose-like text: words of varying length joined by the separators the
/// chunker prefers, with the occasional long token that forces a hard cut.
fn arb_text() -> impl Strategy<Value = String> {
    let word = prop_oneof![8 => "[a-z]{1,9}", 1 => "[a-zé]{20,60}"];
    let separator = prop_oneof![
        6 => Just(" "),
        2 => Just(". "),
        1 => Just("\n"),
        1 => Just("\n\n"),
    ];
    proptest::collection::vec((word, separator), 0..80).prop_map(|parts| {
        parts.into_iter().map(|(word, sep)| format!("{word}{sep}")).collect::<String>()
    })
}

fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (20usize..120).prop_flat_map(|size| (Just(size), 0..size / 2))
}

fn chunk(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
    RecursiveChunker::new(size, overlap).unwrap().chunk(&Document::new("a.pdf", text).with_page(3))
}

/// Undo the overlap between consecutive chunks, restoring the whitespace that
/// separated them in the original.
fn reconstruct(original: &[char], chunks: &[Chunk]) -> String {
    let mut rebuilt = String::new();
    let mut covered = match chunks.first() {
        Some(first) => first.metadata.start_offset,
        None => return rebuilt,
    };
    for chunk in chunks {
        let start = chunk.metadata.start_offset;
        let text: Vec<char> = chunk.text.chars().collect();
        if start >= covered {
            rebuilt.extend(&original[covered..start]);
            rebuilt.extend(&text);
        } else {
            rebuilt.extend(&text[(covered - start).min(text.len())..]);
        }
        covered = covered.max(start + text.len());
    }
    rebuilt
}

mod prop_chunker {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_are_bounded_and_anchored(text in arb_text(), (size, overlap) in arb_sizes()) {
            let chars: Vec<char> = text.chars().collect();
            let chunks = chunk(&text, size, overlap);

            prop_assert_eq!(chunks.is_empty(), text.trim().is_empty());
            for (i, c) in chunks.iter().enumerate() {
                let len = c.text.chars().count();
                prop_assert!(len > 0);
                prop_assert!(len <= size, "chunk {} has {} chars, limit {}", i, len, size);
                prop_assert_eq!(c.metadata.chunk_index, i);
                prop_assert_eq!(&c.id, &format!("a.pdf#p3-{i}"));

                let start = c.metadata.start_offset;
                let at_offset: String = chars[start..start + len].iter().collect();
                prop_assert_eq!(&at_offset, &c.text);
            }
            for pair in chunks.windows(2) {
                prop_assert!(pair[0].metadata.start_offset < pair[1].metadata.start_offset);
            }
        }

        #[test]
        fn deoverlapped_chunks_reconstruct_text(text in arb_text(), (size, overlap) in arb_sizes()) {
            let chars: Vec<char> = text.chars().collect();
            let chunks = chunk(&text, size, overlap);
            prop_assert_eq!(reconstruct(&chars, &chunks), text.trim());
        }

        #[test]
        fn neighbours_share_at_most_overlap_chars(text in arb_text(), (size, overlap) in arb_sizes()) {
            let chars: Vec<char> = text.chars().collect();
            let chunks = chunk(&text, size, overlap);
            for pair in chunks.windows(2) {
                let (prev, next) = (&pair[0], &pair[1]);
                let prev_end = prev.metadata.start_offset + prev.text.chars().count();
                if next.metadata.start_offset > prev_end {
                    let gap = &chars[prev_end..next.metadata.start_offset];
                    prop_assert!(gap.iter().all(|c| c.is_whitespace()));
                }
                let shared = prev_end.saturating_sub(next.metadata.start_offset);
                prop_assert!(shared <= overlap, "shared {} > overlap {}", shared, overlap);

                let head: String = next.text.chars().take(shared).collect();
                prop_assert!(prev.text.ends_with(&head));
            }
        }

        #[test]
        fn neighbours_overlap_on_word_boundaries(text in arb_text(), (size, overlap) in arb_sizes()) {
            prop_assume!(overlap > 0);
            let chars: Vec<char> = text.chars().collect();
            let chunks = chunk(&text, size, overlap);
            for (i, pair) in chunks.windows(2).enumerate() {
                let (prev, next) = (&pair[0], &pair[1]);
                let prev_end = prev.metadata.start_offset + prev.text.chars().count();

                // The cut may swallow trailing whitespace; only when that run is
                // shorter than the overlap is there text left to repeat.
                let trailing_space = chars[prev_end..].iter().take_while(|c| c.is_whitespace()).count();
                if trailing_space >= overlap {
                    continue;
                }

                let start = next.metadata.start_offset;
                prop_assert!(start < prev_end, "chunks {} and {} do not overlap", i, i + 1);
                let head: String = chars[start..prev_end].iter().collect();
                prop_assert!(prev.text.ends_with(&head));
                prop_assert!(next.text.starts_with(&head));
                prop_assert!(
                    chars[start - 1].is_whitespace() || !head.chars().any(char::is_whitespace),
                    "overlap {:?} starts mid-word although it spans a word boundary",
                    head
                );
            }
        }
    }
}

#[test]
fn leave_policy_splits_into_two_overlapping_chunks() {
    let chunks = chunk("Leave policy allows 20 days annually. Sick leave is separate.", 40, 10);
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, ["Leave policy allows 20 days annually.", "annually. Sick leave is separate."]);
}
