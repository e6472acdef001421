//! Normalizes an assistant reply into text plus tool calls.
//!
//! Native `tool_calls` win. Models without function calling may instead answer
//! with a JSON decision in the text:
//! `{"type":"tool_call","tool_name":"...","tool_args":{...}}` or
//! `{"type":"final","content":"..."}`.

use serde_json::Value;
use uuid::Uuid;

use super::transcript::ToolCall;
use crate::llm::AssistantReply;

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

pub fn decide(reply: AssistantReply) -> Decision {
    let content = reply.content.unwrap_or_default();

    if !reply.tool_calls.is_empty() {
        let tool_calls = reply
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                argument: call.function.arguments,
            })
            .collect();
        return Decision {
            content,
            tool_calls,
        };
    }

    match parse_json_from_text(&content).and_then(|value| parse_decision_from_value(&value)) {
        Some(decision) => decision,
        None => Decision {
            content,
            tool_calls: Vec::new(),
        },
    }
}

fn parse_json_from_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !trimmed.contains('{') {
        return None;
    }

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    // fenced or prefixed JSON block
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
}

fn parse_decision_from_value(value: &Value) -> Option<Decision> {
    let action_type = value
        .get("type")
        .or_else(|| value.get("action"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match action_type {
        "tool_call" => {
            let name = value
                .get("tool_name")
                .or_else(|| value.get("name"))
                .or_else(|| value.get("tool"))
                .and_then(|v| v.as_str())?;
            let argument = match value.get("tool_args").or_else(|| value.get("args")) {
                Some(Value::String(raw)) => raw.clone(),
                Some(other) => other.to_string(),
                None => "{}".to_string(),
            };
            Some(Decision {
                content: String::new(),
                tool_calls: vec![ToolCall {
                    id: format!("call_{}", Uuid::new_v4().simple()),
                    name: name.to_string(),
                    argument,
                }],
            })
        }
        "final" => {
            let content = value
                .get("content")
                .or_else(|| value.get("message"))
                .or_else(|| value.get("response"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Some(Decision {
                content,
                tool_calls: Vec::new(),
            })
        }
        _ => None,
    }
}
