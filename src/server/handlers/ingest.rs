use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::errors::ApiError;
use crate::rag::IngestError;
use crate::state::AppState;

pub async fn ingest(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    match state.ingestion.run().await {
        Ok(report) => Ok(Json(report)),
        Err(IngestError::AlreadyRunning) => Err(ApiError::Conflict(
            "an ingestion run is already in progress".to_string(),
        )),
        Err(err) => {
            tracing::error!("Ingestion failed: {}", err);
            Err(ApiError::internal(err))
        }
    }
}
