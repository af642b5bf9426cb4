use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handoff::HandoffParcel;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// POST /auth/handoff - Issue a one-time code for the caller's session
///
/// The sending dashboard redirects with `?code=...` instead of the token itself.
pub async fn issue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let role = state
        .users
        .find_by_id(auth.user_id)
        .map(|u| u.role)
        .ok_or_else(|| ApiError::not_found("User no longer exists"))?;

    let (code, expires_at) = state.handoffs.issue(HandoffParcel {
        token: auth.token,
        role,
    });

    Ok(Json(json!({
        "code": code,
        "expires_at": expires_at,
    })))
}
