use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - Authenticate and receive a bearer token
///
/// Expected Output:
/// ```json
/// {
///   "token": "eyJhbGciOiJIUzI1NiI...",
///   "user": { "id": "uuid", "email": "ada@example.com", "name": "Ada", "role": "Admin" }
/// }
/// ```
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let Some(user) = state.users.authenticate(&payload.email, &payload.password) else {
        tracing::info!("Failed login for {}", payload.email);
        return Err(ApiError::unauthorized("Invalid email or password"));
    };

    let token = state.tokens.issue(user)?;
    tracing::info!("{} logged in as {}", user.email, user.role);

    Ok(Json(json!({
        "token": token,
        "user": {
            "id": user.id,
            "email": user.email,
            "name": user.name,
            "role": user.role,
        }
    })))
}

/// GET /auth/logout - Best-effort logout
///
/// Tokens are stateless, so there is nothing to revoke server-side; clients
/// clear their own storage whatever this returns.
pub async fn logout() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Logged out"
    }))
}
