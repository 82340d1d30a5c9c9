//! On-disk index store.
//!
//! The index lives in a single `index.json` file inside the store directory.
//! Writes go to `index.json.tmp` first and are renamed into place, so readers
//! only ever see a complete file. Vectors are stored as base64 of their
//! little-endian `f32` bytes, which round-trips bit for bit.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::document::{Chunk, ChunkMetadata, IndexEntry};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::store::{IndexStore, StoreManifest};

const INDEX_FILE: &str = "index.json";
const INDEX_FILE_TMP: &str = "index.json.tmp";

/// An [`IndexStore`] persisted as JSON in a directory.
///
/// An absent directory, or one without `index.json`, is the "needs rebuild"
/// signal.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{DirectoryIndexStore, IndexStore};
///
/// let store = DirectoryIndexStore::new("vector_store", "text-embedding-3-large");
/// store.persist(&index).await?;
/// let restored = store.load().await?;
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryIndexStore {
    dir: PathBuf,
    embedding_model: String,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    manifest: StoreManifest,
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    id: String,
    text: String,
    metadata: ChunkMetadata,
    #[serde(with = "vector_base64")]
    embedding: Vec<f32>,
}

impl DirectoryIndexStore {
    /// Create a store rooted at `dir` for vectors from `embedding_model`.
    pub fn new(dir: impl Into<PathBuf>, embedding_model: impl Into<String>) -> Self {
        Self { dir: dir.into(), embedding_model: embedding_model.into() }
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn unavailable(&self, reason: impl Into<String>) -> RagError {
        RagError::StoreUnavailable { location: self.location(), reason: reason.into() }
    }

    fn write_error(&self, message: impl Into<String>) -> RagError {
        RagError::StoreError { location: self.location(), message: message.into() }
    }

    async fn read_persisted(&self) -> Result<PersistedIndex> {
        let bytes = match fs::read(self.index_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(self.unavailable("no persisted index"));
            }
            Err(e) => return Err(self.unavailable(format!("unreadable index: {e}"))),
        };
        serde_json::from_slice(&bytes).map_err(|e| self.unavailable(format!("corrupt index: {e}")))
    }
}

#[async_trait]
impl IndexStore for DirectoryIndexStore {
    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    async fn exists(&self) -> bool {
        fs::try_exists(self.index_path()).await.unwrap_or(false)
    }

    async fn persist(&self, index: &VectorIndex) -> Result<()> {
        let persisted = PersistedIndex {
            manifest: StoreManifest::describe(index, &self.embedding_model),
            entries: index
                .entries()
                .iter()
                .map(|entry| PersistedEntry {
                    id: entry.chunk.id.clone(),
                    text: entry.chunk.text.clone(),
                    metadata: entry.chunk.metadata.clone(),
                    embedding: entry.embedding.clone(),
                })
                .collect(),
        };
        let json = serde_json::to_vec(&persisted)
            .map_err(|e| self.write_error(format!("failed to serialize index: {e}")))?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.write_error(format!("failed to create directory: {e}")))?;
        let tmp_path = self.dir.join(INDEX_FILE_TMP);
        fs::write(&tmp_path, json)
            .await
            .map_err(|e| self.write_error(format!("failed to write index: {e}")))?;
        fs::rename(&tmp_path, self.index_path())
            .await
            .map_err(|e| self.write_error(format!("failed to move index into place: {e}")))?;

        info!(store = %self.location(), entries = index.len(), "persisted index");
        Ok(())
    }

    async fn load(&self) -> Result<VectorIndex> {
        let persisted = self.read_persisted().await?;
        let manifest = persisted.manifest;
        manifest.check_compatible(&self.location(), &self.embedding_model)?;

        if manifest.entry_count != persisted.entries.len() {
            return Err(self.unavailable(format!(
                "manifest lists {} entries, found {}",
                manifest.entry_count,
                persisted.entries.len()
            )));
        }

        let entries = persisted
            .entries
            .into_iter()
            .map(|entry| IndexEntry {
                chunk: Chunk { id: entry.id, text: entry.text, metadata: entry.metadata },
                embedding: entry.embedding,
            })
            .collect();
        let index = VectorIndex::from_entries(entries)
            .map_err(|e| self.unavailable(format!("inconsistent index: {e}")))?;

        if index.dimensions() != manifest.dimensions {
            return Err(self.unavailable(format!(
                "manifest lists {} dimensions, vectors have {}",
                manifest.dimensions,
                index.dimensions()
            )));
        }

        debug!(store = %self.location(), entries = index.len(), "loaded index");
        Ok(index)
    }

    async fn manifest(&self) -> Result<StoreManifest> {
        Ok(self.read_persisted().await?.manifest)
    }
}

mod vector_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vector: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: Vec<u8> = vector.iter().flat_map(|value| value.to_le_bytes()).collect();
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(encoded).map_err(D::Error::custom)?;
        if bytes.len() % 4 != 0 {
            return Err(D::Error::custom("vector byte length is not a multiple of 4"));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}
