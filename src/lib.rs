pub mod auth;
pub mod chat;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod handoff;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;
pub mod types;
