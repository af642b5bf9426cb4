use axum::{extract::State, Json};
use serde::Deserialize;

use crate::error::ApiError;
use crate::handoff::HandoffParcel;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    pub code: String,
}

/// POST /auth/handoff/exchange - Redeem a one-time handoff code
///
/// Returns `{ "token": "...", "role": "Admin" }`. Unknown, expired and
/// already-redeemed codes all answer 404.
pub async fn exchange(
    State(state): State<AppState>,
    Json(payload): Json<ExchangeRequest>,
) -> Result<Json<HandoffParcel>, ApiError> {
    let parcel = state
        .handoffs
        .redeem(payload.code.trim())
        .ok_or_else(|| ApiError::not_found("Handoff code is invalid or expired"))?;

    tracing::info!("Redeemed handoff code for {} session", parcel.role);
    Ok(Json(parcel))
}
