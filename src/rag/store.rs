//! Storage interface for the chunk index.
//!
//! The shipped implementation is `SqliteRagStore`; the conversation loop only
//! ever reads through `KnowledgeBase`, ingestion is the only writer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::KnowledgeError;

/// A stored document chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Content-derived identifier (sha256 of source, position and text).
    pub chunk_id: String,
    /// The text content of the chunk.
    pub content: String,
    /// Source document (file name).
    pub source: String,
    /// Position of the chunk within its source.
    pub chunk_index: usize,
    /// Optional metadata (JSON), e.g. `start_offset`.
    pub metadata: Option<serde_json::Value>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Top-`limit` chunks by similarity to the query embedding.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, KnowledgeError>;

    async fn count(&self) -> Result<usize, KnowledgeError>;

    /// Distinct source documents currently indexed.
    async fn sources(&self) -> Result<Vec<String>, KnowledgeError>;

    /// Embedder recorded by the last rebuild, if any.
    async fn indexed_with(&self) -> Result<Option<String>, KnowledgeError>;

    /// Drop every chunk, insert `items` and record `embedder_name`, atomically.
    async fn replace_all(
        &self,
        embedder_name: &str,
        items: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<(), KnowledgeError>;
}
