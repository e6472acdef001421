use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::agent::{ResearchError, ResearchRequest};
use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResearchBody {
    #[serde(default, alias = "query")]
    pub question: Option<String>,
    #[serde(default)]
    pub max_turns: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub answer: String,
}

pub async fn research(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResearchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let question = body.question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }
    let limit = state.settings.server.max_input_length;
    if question.chars().count() > limit {
        return Err(ApiError::BadRequest(format!(
            "question exceeds {} characters",
            limit
        )));
    }

    let request = ResearchRequest::new(question).with_max_turns(body.max_turns);
    match state.research.run(request).await {
        Ok(outcome) => Ok(Json(ResearchResponse {
            answer: outcome.answer,
        })),
        Err(err @ ResearchError::InvalidRequest(_)) => Err(ApiError::BadRequest(err.user_message())),
        Err(err) => {
            tracing::error!("Research request failed: {}", err);
            Err(ApiError::Internal(err.user_message()))
        }
    }
}
