use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("knowledge store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),

    #[error("embedder returned {got} vectors for {expected} inputs")]
    EmbeddingCount { expected: usize, got: usize },
}
