use serde::Serialize;

use crate::llm::{ChatMessage, ChatToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Driver,
    Assistant,
    Tool,
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument text (usually JSON).
    pub argument: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub turn_index: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Append-only record of one research conversation. `turn_index` is assigned
/// on push, so it is strictly increasing by construction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        role: Role,
        content: String,
        tool_calls: Vec<ToolCall>,
        tool_call_id: Option<String>,
    ) -> &Message {
        let turn_index = self.messages.len();
        self.messages.push(Message {
            role,
            content,
            turn_index,
            tool_calls,
            tool_call_id,
        });
        &self.messages[turn_index]
    }

    pub fn push_driver(&mut self, content: impl Into<String>) -> &Message {
        self.push(Role::Driver, content.into(), Vec::new(), None)
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, tool_calls: Vec<ToolCall>) -> &Message {
        self.push(Role::Assistant, content.into(), tool_calls, None)
    }

    pub fn push_tool_result(&mut self, result: ToolResult) -> &Message {
        self.push(Role::Tool, result.content, Vec::new(), Some(result.call_id))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Renders the transcript as a chat request: system prompt first, the
    /// driver speaking as `user`.
    pub fn to_chat_messages(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut chat = Vec::with_capacity(self.messages.len() + 1);
        if !system_prompt.trim().is_empty() {
            chat.push(ChatMessage::system(system_prompt));
        }

        for message in &self.messages {
            let rendered = match message.role {
                Role::Driver => ChatMessage::user(message.content.clone()),
                Role::Assistant => ChatMessage::assistant(
                    message.content.clone(),
                    message
                        .tool_calls
                        .iter()
                        .map(|call| ChatToolCall::function(&call.id, &call.name, &call.argument))
                        .collect(),
                ),
                Role::Tool => ChatMessage::tool(
                    message.content.clone(),
                    message.tool_call_id.clone().unwrap_or_default(),
                ),
            };
            chat.push(rendered);
        }
        chat
    }
}
