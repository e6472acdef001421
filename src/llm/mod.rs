pub mod error;
pub mod hashing;
pub mod openai;
pub mod provider;
pub mod types;

use std::sync::Arc;

pub use error::LlmError;
pub use hashing::HashingEmbedder;
pub use openai::OpenAiProvider;
pub use provider::{ChatModel, Embedder};
pub use types::{AssistantReply, ChatMessage, ChatRequest, ChatToolCall, FunctionCall, ToolSpec};

use crate::core::config::{EmbeddingProviderKind, Settings};

/// Builds the embedder selected by `llm.embedding_provider`.
pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>, LlmError> {
    match settings.llm.embedding_provider {
        EmbeddingProviderKind::OpenAi => Ok(Arc::new(OpenAiProvider::from_settings(&settings.llm)?)),
        EmbeddingProviderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(
            settings.llm.embedding_dimensions,
        ))),
    }
}
