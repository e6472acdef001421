//! Tools the assistant can call during a conversation.

mod registry;
mod retrieval;

use async_trait::async_trait;

use crate::llm::ToolSpec;

pub use registry::{ToolInvocationError, ToolRegistry};
pub use retrieval::{RetrievalTool, NO_RESULTS, RETRIEVAL_TOOL_NAME};

/// A callable tool. Calls never fail: problems are reported as text so the
/// model can read them and carry on.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// `argument` is the raw argument string from the tool call.
    async fn call(&self, argument: &str) -> String;
}
