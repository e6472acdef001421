use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::error::LlmError;
use super::provider::{ChatModel, Embedder};
use super::types::{AssistantReply, ChatRequest, ChatToolCall};
use crate::core::config::settings::LlmSettings;

/// Client for any OpenAI-compatible endpoint (GitHub Models, Azure, OpenAI,
/// local servers). Serves both chat completions and embeddings.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        api_key: &str,
        chat_model: &str,
        embedding_model: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingCredential);
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(30)))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            chat_model: chat_model.to_string(),
            embedding_model: embedding_model.to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self, LlmError> {
        let api_key = settings
            .api_token
            .as_deref()
            .ok_or(LlmError::MissingCredential)?;
        Self::new(
            &settings.api_base_url,
            api_key,
            &settings.model,
            &settings.embedding_model,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, LlmError> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(res.json::<Value>().await?)
    }
}

#[async_trait]
impl ChatModel for OpenAiProvider {
    async fn complete(&self, request: ChatRequest) -> Result<AssistantReply, LlmError> {
        let body = build_chat_body(&request, &self.chat_model);
        let payload = self.post_json("/chat/completions", &body).await?;
        parse_chat_response(&payload)
    }
}

#[async_trait]
impl Embedder for OpenAiProvider {
    fn name(&self) -> String {
        format!("openai:{}", self.embedding_model)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });
        let payload = self.post_json("/embeddings", &body).await?;
        parse_embedding_response(&payload, inputs.len())
    }
}

pub(crate) fn build_chat_body(request: &ChatRequest, model: &str) -> Value {
    let mut body = json!({
        "model": model,
        "messages": request.messages,
        "stream": false,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            obj.insert("max_tokens".to_string(), json!(t));
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".to_string(), Value::Array(tools));
        }
    }

    body
}

pub(crate) fn parse_chat_response(payload: &Value) -> Result<AssistantReply, LlmError> {
    let message = payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let tool_calls = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .filter_map(|(index, call)| {
                    let function = call.get("function")?;
                    let name = function.get("name")?.as_str()?;
                    let arguments = function
                        .get("arguments")
                        .and_then(|v| v.as_str())
                        .unwrap_or("{}");
                    let id = call
                        .get("id")
                        .and_then(|v| v.as_str())
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("call_{}", index));
                    Some(ChatToolCall::function(id, name, arguments))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(AssistantReply {
        content,
        tool_calls,
    })
}

pub(crate) fn parse_embedding_response(
    payload: &Value,
    expected: usize,
) -> Result<Vec<Vec<f32>>, LlmError> {
    let data = payload
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| LlmError::InvalidResponse("embedding response has no data".to_string()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = data
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let index = item
                .get("index")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(position);
            let values = item.get("embedding")?.as_array()?;
            let vector = values
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            Some((index, vector))
        })
        .collect();

    if indexed.len() != expected {
        return Err(LlmError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            indexed.len()
        )));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ChatMessage, ToolSpec};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    async fn spawn_upstream(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{}", addr)
    }

    fn provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            base_url,
            "test-token",
            "gpt-4o",
            "text-embedding-3-small",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn body_includes_tools_only_when_offered() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]).with_temperature(0.2);
        let body = build_chat_body(&request, "gpt-4o");
        assert!(body.get("tools").is_none());
        assert_eq!(body["temperature"], json!(0.2));

        let request = request.with_tools(vec![ToolSpec {
            name: "query_knowledge_base".to_string(),
            description: "Search the document database".to_string(),
            parameters: json!({"type": "object"}),
        }]);
        let body = build_chat_body(&request, "gpt-4o");
        assert_eq!(body["tools"][0]["function"]["name"], "query_knowledge_base");
    }

    #[test]
    fn parses_tool_calls_and_fills_missing_ids() {
        let payload = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "type": "function",
                        "function": {"name": "query_knowledge_base", "arguments": "{\"question\":\"x\"}"}
                    }]
                }
            }]
        });
        let reply = parse_chat_response(&payload).unwrap();
        assert!(reply.content.is_none());
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].id, "call_0");
        assert_eq!(reply.tool_calls[0].function.arguments, "{\"question\":\"x\"}");
    }

    #[test]
    fn missing_choices_is_invalid() {
        let err = parse_chat_response(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn embeddings_are_ordered_by_index() {
        let payload = json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vectors = parse_embedding_response(&payload, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(parse_embedding_response(&payload, 3).is_err());
    }

    #[test]
    fn blank_token_is_rejected() {
        let err = OpenAiProvider::new("http://x", " ", "m", "e", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::MissingCredential));
    }

    #[tokio::test]
    async fn completes_against_compatible_server() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth != "Bearer test-token" {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad token"})));
                }
                let question = body["messages"][0]["content"].as_str().unwrap_or_default();
                (
                    StatusCode::OK,
                    Json(json!({
                        "choices": [{"message": {"content": format!("echo: {} TERMINATE", question)}}]
                    })),
                )
            }),
        );
        let base_url = spawn_upstream(router).await;

        let reply = provider(&base_url)
            .complete(ChatRequest::new(vec![ChatMessage::user("ping")]))
            .await
            .unwrap();
        assert_eq!(reply.content.as_deref(), Some("echo: ping TERMINATE"));
    }

    #[tokio::test]
    async fn non_success_status_is_surfaced() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
        );
        let base_url = spawn_upstream(router).await;

        let err = provider(&base_url)
            .complete(ChatRequest::new(vec![ChatMessage::user("ping")]))
            .await
            .unwrap_err();
        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn embeds_through_embeddings_endpoint() {
        let router = Router::new().route(
            "/embeddings",
            post(|Json(body): Json<Value>| async move {
                let count = body["input"].as_array().map(|a| a.len()).unwrap_or(0);
                let data: Vec<Value> = (0..count)
                    .map(|i| json!({"index": i, "embedding": [i as f64, 1.0]}))
                    .collect();
                Json(json!({ "data": data }))
            }),
        );
        let base_url = spawn_upstream(router).await;

        let provider = provider(&base_url);
        let vectors = provider
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![0.0, 1.0], vec![1.0, 1.0]]);
        assert_eq!(provider.name(), "openai:text-embedding-3-small");
    }
}
