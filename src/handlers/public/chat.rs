use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use serde::Deserialize;

use crate::chat::ChatReply;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// POST /gemini - Relay a prompt to the first available generative model
///
/// Success: `{ content, timestamp, type: "bot", modelUsed, apiVersion }`.
/// Failure: 500 `{ error, details }` once every candidate model has failed.
pub async fn gemini(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::bad_request(format!("Message is required: {}", e.body_text())))?;
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }

    let reply = state.chat.reply(message).await.map_err(|e| {
        tracing::error!("Chat relay failed: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(reply))
}
