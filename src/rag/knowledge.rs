use std::sync::Arc;

use tokio::sync::RwLock;

use super::error::KnowledgeError;
use super::store::{ChunkSearchResult, KnowledgeStore, StoredChunk};
use crate::llm::Embedder;

/// A store paired with the embedder that produced its vectors.
///
/// Queries hold the read side of `gate`; a rebuild holds the write side, so
/// no query ever observes a half-replaced index.
pub struct KnowledgeBase {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn Embedder>,
    gate: RwLock<()>,
}

impl KnowledgeBase {
    pub fn new(store: Arc<dyn KnowledgeStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            gate: RwLock::new(()),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Top-`k` chunks for a free-text query. An empty query is embedded as-is.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ChunkSearchResult>, KnowledgeError> {
        let _guard = self.gate.read().await;

        if self.store.count().await? == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = vectors.pop().ok_or(KnowledgeError::EmbeddingCount {
            expected: 1,
            got: 0,
        })?;

        self.store.search(&query_vector, k).await
    }

    /// Embeds `texts` in batches of `batch_size`. Runs outside the gate so
    /// queries keep flowing while a rebuild is being prepared.
    pub async fn embed_all(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            let embedded = self.embedder.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(KnowledgeError::EmbeddingCount {
                    expected: batch.len(),
                    got: embedded.len(),
                });
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    /// Replaces the whole index under the write side of the gate.
    pub async fn replace_all(
        &self,
        items: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<(), KnowledgeError> {
        let _guard = self.gate.write().await;
        self.store.replace_all(&self.embedder.name(), items).await
    }

    pub async fn count(&self) -> Result<usize, KnowledgeError> {
        let _guard = self.gate.read().await;
        self.store.count().await
    }

    pub async fn sources(&self) -> Result<Vec<String>, KnowledgeError> {
        let _guard = self.gate.read().await;
        self.store.sources().await
    }

    /// Warns when the index was built with a different embedder than the one
    /// configured now; its vectors would not be comparable.
    pub async fn check_embedder(&self) -> Result<(), KnowledgeError> {
        let current = self.embedder.name();
        if let Some(indexed) = self.store.indexed_with().await? {
            if indexed != current {
                tracing::warn!(
                    "Knowledge store was built with `{}` but `{}` is configured; re-run ingestion",
                    indexed,
                    current
                );
            }
        }
        Ok(())
    }
}
