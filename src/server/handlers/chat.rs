use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Run one chat turn. Empty input is ignored and reported as skipped;
/// a turn already in flight surfaces as 409.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match state.orchestrator.send_message(&payload.message).await? {
        Some(outcome) => Ok(Json(json!({
            "reply": outcome.message,
            "sources": outcome.sources,
            "cached": outcome.cached
        }))),
        None => Ok(Json(json!({ "skipped": true }))),
    }
}

pub async fn regenerate(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    match state.orchestrator.regenerate().await? {
        Some(outcome) => Ok(Json(json!({
            "reply": outcome.message,
            "sources": outcome.sources,
            "cached": outcome.cached
        }))),
        None => Err(ApiError::NotFound("No user message to regenerate".to_string())),
    }
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(json!({
        "messages": state.orchestrator.messages(),
        "user": state.orchestrator.active_user()
    })))
}
