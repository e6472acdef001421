use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use super::Tool;
use crate::llm::ToolSpec;

#[derive(Debug, Error, PartialEq)]
pub enum ToolInvocationError {
    #[error("unknown tool `{name}`; available tools: {available}")]
    UnknownTool { name: String, available: String },
}

/// Name-indexed set of tools offered to the assistant.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.spec().name, tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub async fn execute(&self, name: &str, argument: &str) -> Result<String, ToolInvocationError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolInvocationError::UnknownTool {
                name: name.to_string(),
                available: self.names().join(", "),
            })?;
        Ok(tool.call(argument).await)
    }
}
