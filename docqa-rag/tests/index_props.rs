//! Property tests for vector index ordering and persistence.

use std::collections::HashMap;

use docqa_rag::{Chunk, ChunkMetadata, DirectoryIndexStore, IndexEntry, IndexStore, VectorIndex};
use proptest::prelude::*;

const DIM: usize = 16;

fn arb_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim)
}

fn arb_entries() -> impl Strategy<Value = Vec<IndexEntry>> {
    proptest::collection::vec(("[a-z ]{5,30}", 1u32..5, arb_embedding(DIM)), 0..20).prop_map(
        |rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (text, page, embedding))| IndexEntry {
                    chunk: Chunk {
                        id: Chunk::make_id("doc.pdf", Some(page), i),
                        text,
                        metadata: ChunkMetadata {
                            source_name: "doc.pdf".to_string(),
                            page_number: Some(page),
                            chunk_index: i,
                            start_offset: 0,
                            extra: HashMap::new(),
                        },
                    },
                    embedding,
                })
                .collect()
        },
    )
}

mod prop_query_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_are_descending_and_bounded_by_k(
            entries in arb_entries(),
            query in arb_embedding(DIM),
            k in 1usize..25,
        ) {
            let total = entries.len();
            let index = VectorIndex::from_entries(entries).unwrap();
            let results = index.query(&query, k).unwrap();

            prop_assert_eq!(results.len(), k.min(total));
            for pair in results.windows(2) {
                prop_assert!(
                    pair[0].score >= pair[1].score,
                    "scores not descending: {} then {}",
                    pair[0].score,
                    pair[1].score,
                );
            }
        }

        #[test]
        fn persisted_index_answers_queries_identically(
            entries in arb_entries(),
            query in arb_embedding(DIM),
            k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let temp = tempfile::tempdir().unwrap();
            let store = DirectoryIndexStore::new(temp.path().join("store"), "test-embedding");

            let index = VectorIndex::from_entries(entries).unwrap();
            let restored = rt.block_on(async {
                store.persist(&index).await.unwrap();
                store.load().await.unwrap()
            });

            prop_assert_eq!(&restored, &index);
            prop_assert_eq!(restored.query(&query, k).unwrap(), index.query(&query, k).unwrap());
        }
    }
}

#[test]
fn empty_index_query_is_empty() {
    let index = VectorIndex::new();
    assert!(index.query(&[1.0, 0.0], 4).unwrap().is_empty());
}

#[test]
fn equal_scores_keep_insertion_order() {
    let entry = |id: &str| IndexEntry {
        chunk: Chunk {
            id: id.to_string(),
            text: id.to_string(),
            metadata: ChunkMetadata {
                source_name: format!("{id}.pdf"),
                page_number: None,
                chunk_index: 0,
                start_offset: 0,
                extra: HashMap::new(),
            },
        },
        embedding: vec![1.0, 1.0],
    };
    let index = VectorIndex::from_entries(vec![entry("first"), entry("second"), entry("third")]).unwrap();

    let ids: Vec<String> =
        index.query(&[2.0, 2.0], 3).unwrap().into_iter().map(|r| r.chunk.id).collect();
    assert_eq!(ids, ["first", "second", "third"]);
}
