// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (bearer JWT via jwt_auth_middleware)
pub mod public;    // Token acquisition, logout, handoff exchange, chat relay
pub mod protected; // Profile and handoff code issuance

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// GET / - service banner
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "ProjectDesk API",
            "version": version,
            "endpoints": {
                "login": "POST /auth/login (public)",
                "logout": "GET /auth/logout (public, best effort)",
                "profile": "GET /auth/profile (bearer)",
                "handoff": "POST /auth/handoff (bearer), POST /auth/handoff/exchange (public)",
                "chat": "POST /gemini (public)",
            }
        }
    }))
}

/// GET /health - liveness only; there is no database behind this service
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "status": "ok",
                "timestamp": chrono::Utc::now(),
            }
        })),
    )
}
