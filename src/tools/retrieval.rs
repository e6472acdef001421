use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::llm::ToolSpec;
use crate::rag::KnowledgeBase;

pub const RETRIEVAL_TOOL_NAME: &str = "query_knowledge_base";
pub const NO_RESULTS: &str = "No relevant documents found";
const SEPARATOR: &str = "\n\n---\n\n";

/// `query_knowledge_base(question)`: top-k chunks from the knowledge store,
/// joined into one block of text.
pub struct RetrievalTool {
    knowledge: Arc<KnowledgeBase>,
    top_k: usize,
    timeout: Duration,
}

impl RetrievalTool {
    pub fn new(knowledge: Arc<KnowledgeBase>, top_k: usize, timeout: Duration) -> Self {
        Self {
            knowledge,
            top_k: top_k.max(1),
            timeout,
        }
    }

    pub async fn query(&self, question: &str) -> String {
        let lookup = self.knowledge.similarity_search(question, self.top_k);
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(results)) if results.is_empty() => NO_RESULTS.to_string(),
            Ok(Ok(results)) => results
                .into_iter()
                .map(|r| r.chunk.content)
                .collect::<Vec<_>>()
                .join(SEPARATOR),
            Ok(Err(err)) => {
                tracing::warn!("Knowledge base query failed: {}", err);
                format!("Error querying knowledge base: {}", err)
            }
            Err(_) => {
                tracing::warn!("Knowledge base query timed out after {:?}", self.timeout);
                format!(
                    "Error querying knowledge base: timed out after {}s",
                    self.timeout.as_secs()
                )
            }
        }
    }
}

/// Accepts `{"question": ...}` or `{"query": ...}`; anything else is taken as
/// the question text itself.
fn question_from_argument(argument: &str) -> String {
    match serde_json::from_str::<Value>(argument) {
        Ok(Value::Object(map)) => map
            .get("question")
            .or_else(|| map.get("query"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        Ok(Value::String(text)) => text,
        _ => argument.to_string(),
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: RETRIEVAL_TOOL_NAME.to_string(),
            description: "Search the internal document database for specific information."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question to look up in the documents"
                    }
                },
                "required": ["question"]
            }),
        }
    }

    async fn call(&self, argument: &str) -> String {
        let question = question_from_argument(argument);
        tracing::info!("Querying knowledge base: {}", question);
        self.query(&question).await
    }
}
