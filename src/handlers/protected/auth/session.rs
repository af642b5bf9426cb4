use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// GET /auth/profile - Current user, with the server-side role
///
/// Expected Output:
/// ```json
/// { "user": { "id": "uuid", "email": "ada@example.com", "name": "Ada", "role": "Admin" } }
/// ```
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    // The directory is authoritative; the role baked into the token may be stale
    let user = state
        .users
        .find_by_id(auth.user_id)
        .ok_or_else(|| ApiError::not_found("User no longer exists"))?;

    if user.role != auth.role {
        tracing::info!("{} role changed from {} to {}", user.email, auth.role, user.role);
    }

    Ok(Json(json!({
        "user": {
            "id": user.id,
            "email": user.email,
            "name": user.name,
            "role": user.role,
        }
    })))
}
