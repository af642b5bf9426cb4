// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Routed behind jwt_auth_middleware, which injects AuthUser into the request.

pub mod auth;

pub use auth::*;
