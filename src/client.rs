//! HTTP client for a running research service.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::settings::ClientSettings;
use crate::rag::IngestReport;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not reach the research service: {0}")]
    Http(#[from] reqwest::Error),

    #[error("research service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response from research service: {0}")]
    InvalidResponse(String),
}

/// Calls the research API. Every non-200 response is an error; nothing is
/// retried.
#[derive(Clone)]
pub struct ResearchClient {
    base_url: String,
    client: Client,
}

impl ResearchClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ClientError> {
        Self::new(&settings.api_url, Duration::from_secs(settings.timeout_secs))
    }

    pub async fn research(&self, question: &str) -> Result<String, ClientError> {
        let payload: Value = self
            .post("/research", Some(json!({ "question": question })))
            .await?;
        payload
            .get("answer")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ClientError::InvalidResponse("missing `answer` field".to_string()))
    }

    pub async fn ingest(&self) -> Result<IngestReport, ClientError> {
        self.post("/ingest", None).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let res = request.send().await?;
        let status = res.status();
        if status != reqwest::StatusCode::OK {
            let text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(text);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        res.json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn spawn(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{}", addr)
    }

    fn client(base_url: &str) -> ResearchClient {
        ResearchClient::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn returns_answer_text() {
        let router = Router::new().route(
            "/research",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "answer": format!("answer to {}", body["question"].as_str().unwrap_or("")) }))
            }),
        );
        let base = spawn(router).await;
        assert_eq!(client(&base).research("q1").await.unwrap(), "answer to q1");
    }

    #[tokio::test]
    async fn error_status_is_surfaced_without_retry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/research",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"error": "quota exceeded"})),
                    )
                }
            }),
        );
        let base = spawn(router).await;

        let err = client(&base).research("q").await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parses_ingest_report() {
        let router = Router::new().route(
            "/ingest",
            post(|| async {
                Json(json!({"documents": 2, "chunks": 7, "skipped": [], "replaced": true}))
            }),
        );
        let base = spawn(router).await;
        let report = client(&base).ingest().await.unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, 7);
        assert!(report.replaced);
    }
}
