//! HTTP client for the backend endpoints the dashboards consume.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::handoff::HandoffParcel;
use crate::session::{Session, SessionError, SessionStore};
use crate::types::Role;

/// Transport-level failure talking to the backend.
#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request rejected with status {0}")]
    Status(u16),

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Authoritative source for the caller's role.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_role(&self, token: &str) -> Result<Role, ApiClientError>;
}

/// Redeems a one-time handoff code for the session it stands in for.
#[async_trait]
pub trait HandoffExchange: Send + Sync {
    async fn redeem(&self, code: &str) -> Result<HandoffParcel, ApiClientError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ProfileEnvelope {
    user: ProfileUser,
}

#[derive(Debug, Clone, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: ProfileUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandoffCode {
    pub code: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Request(#[from] ApiClientError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Not logged in")]
    NotLoggedIn,
}

/// Thin reqwest wrapper over the backend's auth and chat endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /auth/profile` with the bearer token.
    pub async fn profile(&self, token: &str) -> Result<ProfileUser, ApiClientError> {
        let response = self
            .http
            .get(self.url("/auth/profile"))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiClientError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        let envelope: ProfileEnvelope =
            serde_json::from_value(body).map_err(|e| ApiClientError::Malformed(e.to_string()))?;
        Ok(envelope.user)
    }

    /// Exchange credentials for a token and persist the session.
    pub async fn login(
        &self,
        store: &dyn SessionStore,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(ApiClientError::from)?;

        if !response.status().is_success() {
            return Err(ApiClientError::Status(response.status().as_u16()).into());
        }

        let login: LoginResponse = response.json().await.map_err(ApiClientError::from)?;
        let role = login.user.role.parse::<Role>().ok();
        store.set(Session {
            token: Some(login.token.clone()),
            role,
        })?;
        Ok(login)
    }

    /// Best-effort `GET /auth/logout`; local credentials are cleared whatever
    /// the backend answers.
    pub async fn logout(&self, store: &dyn SessionStore) -> Result<(), SessionError> {
        if let Some(token) = store.token()? {
            match self
                .http
                .get(self.url("/auth/logout"))
                .bearer_auth(&token)
                .send()
                .await
            {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!("Logout returned status {}", response.status());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Logout request failed: {}", e),
            }
        }

        store.clear()
    }

    /// Ask the backend for a one-time code standing in for the current session.
    pub async fn issue_handoff_code(&self, store: &dyn SessionStore) -> Result<HandoffCode, ClientError> {
        let token = store.token()?.ok_or(ClientError::NotLoggedIn)?;
        let response = self
            .http
            .post(self.url("/auth/handoff"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(ApiClientError::from)?;

        if !response.status().is_success() {
            return Err(ApiClientError::Status(response.status().as_u16()).into());
        }
        Ok(response.json().await.map_err(ApiClientError::from)?)
    }

    /// `POST /auth/handoff/exchange`; the code is spent whatever the outcome.
    pub async fn redeem_handoff_code(&self, code: &str) -> Result<HandoffParcel, ApiClientError> {
        let response = self
            .http
            .post(self.url("/auth/handoff/exchange"))
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiClientError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    /// Redeem a handoff code and persist the resulting session.
    pub async fn exchange_handoff_code(
        &self,
        store: &dyn SessionStore,
        code: &str,
    ) -> Result<HandoffParcel, ClientError> {
        let parcel = self.redeem_handoff_code(code).await?;
        store.set(parcel.clone().into())?;
        Ok(parcel)
    }

    /// `POST /gemini` and return the raw reply envelope.
    pub async fn chat(&self, token: Option<&str>, message: &str) -> Result<Value, ApiClientError> {
        let mut request = self
            .http
            .post(self.url("/gemini"))
            .json(&serde_json::json!({ "message": message }));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("Chat relay returned {}: {}", status, text);
            return Err(ApiClientError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&text),
            });
        }
        Ok(response.json().await?)
    }

    pub async fn health(&self) -> Result<Value, ApiClientError> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(response.json().await?)
    }
}

/// Summarize an error body: `error` plus `details` for JSON envelopes, the raw
/// text otherwise.
fn rejection_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    let error = value.get("error").and_then(Value::as_str).unwrap_or("request failed");
    match value.get("details").and_then(Value::as_str) {
        Some(details) => format!("{} ({})", error, details),
        None => error.to_string(),
    }
}

#[async_trait]
impl HandoffExchange for ApiClient {
    async fn redeem(&self, code: &str) -> Result<HandoffParcel, ApiClientError> {
        self.redeem_handoff_code(code).await
    }
}

#[async_trait]
impl ProfileSource for ApiClient {
    async fn fetch_role(&self, token: &str) -> Result<Role, ApiClientError> {
        let user = self.profile(token).await?;
        user.role
            .parse::<Role>()
            .map_err(|e| ApiClientError::Malformed(e.to_string()))
    }
}
