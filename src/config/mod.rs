use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub guard: GuardConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
    pub handoff_code_ttl_secs: u64,
    /// YAML or JSON file listing the accounts allowed to log in
    pub users_file: Option<String>,
}

/// Client-side settings for the route guard and session handoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    pub api_base_url: String,
    pub login_url: String,
    pub unauthorized_path: String,
    pub admin_app_url: String,
    pub client_app_url: String,
    pub revalidate_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub api_key: String,
    pub base_url: String,
    pub models: Vec<String>,
    pub api_versions: Vec<String>,
    pub probe_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("PROJECTDESK_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_HANDOFF_CODE_TTL_SECS") {
            self.security.handoff_code_ttl_secs = v.parse().unwrap_or(self.security.handoff_code_ttl_secs);
        }
        if let Ok(v) = env::var("PROJECTDESK_USERS_FILE") {
            self.security.users_file = Some(v);
        }

        // Guard overrides
        if let Ok(v) = env::var("PROJECTDESK_API_URL") {
            self.guard.api_base_url = v;
        }
        if let Ok(v) = env::var("GUARD_LOGIN_URL") {
            self.guard.login_url = v;
        }
        if let Ok(v) = env::var("GUARD_UNAUTHORIZED_PATH") {
            self.guard.unauthorized_path = v;
        }
        if let Ok(v) = env::var("GUARD_ADMIN_APP_URL") {
            self.guard.admin_app_url = v;
        }
        if let Ok(v) = env::var("GUARD_CLIENT_APP_URL") {
            self.guard.client_app_url = v;
        }
        if let Ok(v) = env::var("GUARD_REVALIDATE_INTERVAL_SECS") {
            match v.parse::<u64>() {
                Ok(secs) if secs > 0 => self.guard.revalidate_interval_secs = secs,
                _ => tracing::warn!("Ignoring GUARD_REVALIDATE_INTERVAL_SECS={:?}, expected a positive number", v),
            }
        }

        // Chat overrides
        if let Ok(v) = env::var("GEMINI_API_KEY") {
            self.chat.api_key = v;
        }
        if let Ok(v) = env::var("CHAT_BASE_URL") {
            self.chat.base_url = v;
        }
        if let Ok(v) = env::var("CHAT_MODELS") {
            self.chat.models = split_list(&v);
        }
        if let Ok(v) = env::var("CHAT_API_VERSIONS") {
            self.chat.api_versions = split_list(&v);
        }
        if let Ok(v) = env::var("CHAT_PROBE_TIMEOUT_SECS") {
            self.chat.probe_timeout_secs = v.parse().unwrap_or(self.chat.probe_timeout_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 5000 },
            security: SecurityConfig {
                jwt_secret: "projectdesk-dev-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                handoff_code_ttl_secs: 60,
                users_file: None,
            },
            guard: GuardConfig {
                api_base_url: "http://localhost:5000".to_string(),
                login_url: "http://localhost:5173/login".to_string(),
                unauthorized_path: "/unauthorized".to_string(),
                admin_app_url: "http://localhost:3000/dashboard".to_string(),
                client_app_url: "http://localhost:5173/dashboard".to_string(),
                revalidate_interval_secs: 30,
            },
            chat: ChatConfig::defaults(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 5000 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: vec!["https://staging.projectdesk.app".to_string()],
                handoff_code_ttl_secs: 60,
                users_file: None,
            },
            guard: GuardConfig {
                api_base_url: "https://api.staging.projectdesk.app".to_string(),
                login_url: "https://staging.projectdesk.app/login".to_string(),
                unauthorized_path: "/unauthorized".to_string(),
                admin_app_url: "https://admin.staging.projectdesk.app/dashboard".to_string(),
                client_app_url: "https://staging.projectdesk.app/dashboard".to_string(),
                revalidate_interval_secs: 30,
            },
            chat: ChatConfig::defaults(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 8080 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                cors_origins: vec!["https://projectdesk.app".to_string(), "https://admin.projectdesk.app".to_string()],
                handoff_code_ttl_secs: 30,
                users_file: None,
            },
            guard: GuardConfig {
                api_base_url: "https://api.projectdesk.app".to_string(),
                login_url: "https://projectdesk.app/login".to_string(),
                unauthorized_path: "/unauthorized".to_string(),
                admin_app_url: "https://admin.projectdesk.app/dashboard".to_string(),
                client_app_url: "https://projectdesk.app/dashboard".to_string(),
                revalidate_interval_secs: 30,
            },
            chat: ChatConfig::defaults(),
        }
    }
}

impl ChatConfig {
    fn defaults() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            models: vec![
                "gemini-1.5-flash".to_string(),
                "gemini-1.5-pro".to_string(),
                "gemini-1.0-pro".to_string(),
                "gemini-pro".to_string(),
            ],
            api_versions: vec!["v1beta".to_string(), "v1".to_string()],
            probe_timeout_secs: 15,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.guard.revalidate_interval_secs, 30);
        assert_eq!(config.guard.unauthorized_path, "/unauthorized");
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.security.jwt_expiry_hours, 4);
    }

    #[test]
    fn test_chat_defaults_probe_v1beta_first() {
        let chat = ChatConfig::defaults();
        assert_eq!(chat.api_versions, vec!["v1beta", "v1"]);
        assert_eq!(chat.models[0], "gemini-1.5-flash");
        assert_eq!(chat.probe_timeout_secs, 15);
    }

    #[test]
    fn test_split_list_drops_blanks() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
    }
}
