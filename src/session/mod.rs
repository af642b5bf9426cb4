//! Session storage for the bearer token and cached role.
//!
//! The dashboards keep exactly one `{token, userRole}` record per store and
//! never reconcile concurrent writers: the last write wins.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Role;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "userRole", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Session {
    pub fn new(token: impl Into<String>, role: Role) -> Self {
        Self {
            token: Some(token.into()),
            role: Some(role),
        }
    }

    /// Presence check only: no signature or expiry validation happens client-side.
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Session storage lock poisoned")]
    Poisoned,
}

pub trait SessionStore: Send + Sync {
    fn get(&self) -> Result<Session, SessionError>;
    fn set(&self, session: Session) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;

    fn token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.get()?.token.filter(|t| !t.is_empty()))
    }

    fn cached_role(&self) -> Result<Option<Role>, SessionError> {
        Ok(self.get()?.role)
    }

    /// Refresh the cached role without touching the token.
    fn cache_role(&self, role: Role) -> Result<(), SessionError> {
        let mut session = self.get()?;
        session.role = Some(role);
        self.set(session)
    }
}

/// In-process store, the stand-in for browser storage in tests and daemons.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: RwLock<Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: RwLock::new(session),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Result<Session, SessionError> {
        self.inner
            .read()
            .map(|s| s.clone())
            .map_err(|_| SessionError::Poisoned)
    }

    fn set(&self, session: Session) -> Result<(), SessionError> {
        let mut guard = self.inner.write().map_err(|_| SessionError::Poisoned)?;
        *guard = session;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.set(Session::default())
    }
}

/// JSON file store used by the command-line front end.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Result<Session, SessionError> {
        if !self.path.exists() {
            return Ok(Session::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Session::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn set(&self, session: Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&session)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
