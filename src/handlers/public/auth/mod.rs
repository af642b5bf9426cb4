// handlers/public/auth/mod.rs - Public authentication handlers

pub mod handoff; // POST /auth/handoff/exchange - redeem a one-time code
pub mod session; // POST /auth/login, GET /auth/logout

pub use handoff::exchange as handoff_exchange;
pub use session::login as session_login;
pub use session::logout as session_logout;
