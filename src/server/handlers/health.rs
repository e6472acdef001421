use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.settings.app.name,
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let chunks = state.knowledge.count().await.map_err(ApiError::internal)?;
    let sources = state.knowledge.sources().await.map_err(ApiError::internal)?;

    Ok(Json(json!({
        "status": "ok",
        "service": state.settings.app.name,
        "knowledge": {
            "chunks": chunks,
            "sources": sources,
            "embedder": state.knowledge.embedder().name(),
            "ingestion_running": state.ingestion.is_running(),
        },
        "agent": {
            "model": state.settings.llm.model,
            "max_turns": state.settings.agent.max_turns,
            "max_turns_limit": state.settings.agent.max_turns_limit,
            "top_k": state.settings.agent.top_k,
        },
        "sandbox": {
            "use_docker": state.settings.sandbox.use_docker,
        },
    })))
}
