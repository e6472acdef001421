use async_trait::async_trait;

use super::error::LlmError;
use super::types::{AssistantReply, ChatRequest};

/// The assistant role's backing model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// chat completion (non-streaming); implementations must not retry
    async fn complete(&self, request: ChatRequest) -> Result<AssistantReply, LlmError>;
}

/// Turns text into vectors for the knowledge store.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// identifier recorded alongside the index (e.g. "openai:text-embedding-3-small")
    fn name(&self) -> String;

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}
