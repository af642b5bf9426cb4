// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition, best-effort logout, handoff code redemption and the chat
// relay. Every input here is untrusted.

pub mod auth;
pub mod chat;

pub use auth::*;
pub use chat::gemini;
