//! Generative chat relay with model discovery.
//!
//! Which model identifiers an API key may use is not known up front, so the
//! relay probes an ordered candidate list (every model under the first API
//! version, then every model under the next) and remembers the first one that
//! answers. Each probe races a fixed timeout so one unresponsive candidate
//! cannot stall discovery.

pub mod gemini;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::config::ChatConfig;

pub use gemini::GeminiClient;

const PROBE_PROMPT: &str = "Hello";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream response had no text")]
    EmptyResponse,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// A text-generation backend addressed by API version and model name.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, api_version: &str, model: &str, prompt: &str) -> Result<String, ModelError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSelection {
    pub model: String,
    pub api_version: String,
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.model)
    }
}

#[derive(Debug, Clone)]
pub struct ProbeFailure {
    pub model: String,
    pub api_version: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("No generative model is available ({} candidates tried)", .attempts.len())]
    Exhausted { attempts: Vec<ProbeFailure> },

    #[error("Generation with {selection} failed: {source}")]
    Generation {
        selection: ModelSelection,
        #[source]
        source: ModelError,
    },
}

impl ChatError {
    /// Human-readable detail for error envelopes.
    pub fn details(&self) -> String {
        match self {
            ChatError::Exhausted { attempts } => attempts
                .iter()
                .map(|a| format!("{}/{}: {}", a.api_version, a.model, a.reason))
                .collect::<Vec<_>>()
                .join("; "),
            ChatError::Generation { source, .. } => source.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub model_used: String,
    pub api_version: String,
}

pub struct ChatRelay {
    backend: Arc<dyn GenerativeModel>,
    models: Vec<String>,
    api_versions: Vec<String>,
    probe_timeout: Duration,
    selected: RwLock<Option<ModelSelection>>,
    discovery: Mutex<()>,
}

impl ChatRelay {
    pub fn new(
        backend: Arc<dyn GenerativeModel>,
        models: Vec<String>,
        api_versions: Vec<String>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            models,
            api_versions,
            probe_timeout,
            selected: RwLock::new(None),
            discovery: Mutex::new(()),
        }
    }

    pub fn from_config(backend: Arc<dyn GenerativeModel>, config: &ChatConfig) -> Self {
        Self::new(
            backend,
            config.models.clone(),
            config.api_versions.clone(),
            Duration::from_secs(config.probe_timeout_secs),
        )
    }

    pub async fn current_model(&self) -> Option<ModelSelection> {
        self.selected.read().await.clone()
    }

    /// Probe every candidate in order and cache the first that answers.
    pub async fn discover(&self) -> Result<ModelSelection, ChatError> {
        let _running = self.discovery.lock().await;
        if let Some(selection) = self.current_model().await {
            return Ok(selection);
        }

        let mut attempts = Vec::new();
        for api_version in &self.api_versions {
            for model in &self.models {
                tracing::debug!("Probing model {} ({})", model, api_version);
                let probe = self.backend.generate(api_version, model, PROBE_PROMPT);
                let outcome = match tokio::time::timeout(self.probe_timeout, probe).await {
                    Ok(result) => result,
                    Err(_) => Err(ModelError::Timeout(self.probe_timeout)),
                };

                match outcome {
                    Ok(_) => {
                        let selection = ModelSelection {
                            model: model.clone(),
                            api_version: api_version.clone(),
                        };
                        tracing::info!("Selected generative model {}", selection);
                        *self.selected.write().await = Some(selection.clone());
                        return Ok(selection);
                    }
                    Err(e) => {
                        tracing::warn!("Model {} ({}) unavailable: {}", model, api_version, e);
                        attempts.push(ProbeFailure {
                            model: model.clone(),
                            api_version: api_version.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        tracing::error!("All {} model candidates failed", attempts.len());
        Err(ChatError::Exhausted { attempts })
    }

    /// Answer `message` with the cached model, discovering one first if needed.
    pub async fn reply(&self, message: &str) -> Result<ChatReply, ChatError> {
        let selection = match self.current_model().await {
            Some(selection) => selection,
            None => self.discover().await?,
        };

        match self
            .backend
            .generate(&selection.api_version, &selection.model, message)
            .await
        {
            Ok(content) => Ok(ChatReply {
                content,
                timestamp: Utc::now(),
                kind: "bot",
                model_used: selection.model,
                api_version: selection.api_version,
            }),
            Err(source) => {
                // Forget the model so the next request rediscovers
                let mut selected = self.selected.write().await;
                if selected.as_ref() == Some(&selection) {
                    *selected = None;
                }
                Err(ChatError::Generation { selection, source })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Scripted backend: answers only for the listed (version, model) pairs,
    /// hangs for the listed stalled pairs, and records every call.
    #[derive(Default)]
    pub struct ScriptedModel {
        pub working: Vec<(String, String)>,
        pub stalled: Vec<(String, String)>,
        pub calls: StdMutex<Vec<(String, String)>>,
    }

    impl ScriptedModel {
        pub fn working(pairs: &[(&str, &str)]) -> Self {
            Self {
                working: pairs.iter().map(|(v, m)| (v.to_string(), m.to_string())).collect(),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate(&self, api_version: &str, model: &str, prompt: &str) -> Result<String, ModelError> {
            let key = (api_version.to_string(), model.to_string());
            self.calls.lock().unwrap().push(key.clone());

            if self.stalled.contains(&key) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.working.contains(&key) {
                Ok(format!("echo: {}", prompt))
            } else {
                Err(ModelError::Status {
                    status: 404,
                    body: format!("models/{} is not found", model),
                })
            }
        }
    }

    pub fn relay(backend: Arc<ScriptedModel>, timeout: Duration) -> ChatRelay {
        ChatRelay::new(
            backend,
            vec!["flash".into(), "pro".into(), "legacy".into()],
            vec!["v1beta".into(), "v1".into()],
            timeout,
        )
    }
}
