use std::sync::Arc;

use anyhow::Context;

use crate::auth::{HandoffCodes, TokenIssuer, UserDirectory};
use crate::chat::{ChatRelay, GeminiClient};
use crate::config::AppConfig;

/// Shared handles behind every route.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenIssuer>,
    pub users: Arc<UserDirectory>,
    pub handoffs: Arc<HandoffCodes>,
    pub chat: Arc<ChatRelay>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let tokens = TokenIssuer::from_config(&config.security).context("JWT_SECRET must be set")?;

        let users = match &config.security.users_file {
            Some(path) => UserDirectory::load(path)
                .with_context(|| format!("failed to load users from {}", path))?,
            None => {
                tracing::warn!("No users file configured; login is disabled");
                UserDirectory::default()
            }
        };
        tracing::info!("Loaded {} user accounts", users.len());

        if config.chat.api_key.is_empty() {
            tracing::warn!("GEMINI_API_KEY is not set; chat relay requests will fail");
        }
        let gemini = GeminiClient::new(&config.chat.base_url, &config.chat.api_key);

        Ok(Self {
            tokens: Arc::new(tokens),
            users: Arc::new(users),
            handoffs: Arc::new(HandoffCodes::new(config.security.handoff_code_ttl_secs)),
            chat: Arc::new(ChatRelay::from_config(Arc::new(gemini), &config.chat)),
        })
    }
}
