use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::hash_password;
use crate::types::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    pub password_sha256: String,
}

#[derive(Debug, Error)]
pub enum UserDirectoryError {
    #[error("Unable to read users file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid users file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Deserialize)]
struct UsersFile {
    users: Vec<UserRecord>,
}

/// Accounts allowed to log in, keyed by lower-cased email.
#[derive(Debug, Default)]
pub struct UserDirectory {
    by_email: HashMap<String, UserRecord>,
}

impl UserDirectory {
    pub fn new(users: impl IntoIterator<Item = UserRecord>) -> Self {
        Self {
            by_email: users
                .into_iter()
                .map(|u| (u.email.to_lowercase(), u))
                .collect(),
        }
    }

    /// Load a `users:` list from YAML (JSON files parse too).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, UserDirectoryError> {
        let content = fs::read_to_string(path)?;
        let file: UsersFile = serde_yaml::from_str(&content)?;
        Ok(Self::new(file.users))
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<&UserRecord> {
        self.by_email.values().find(|u| u.id == id)
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Option<&UserRecord> {
        let user = self.by_email.get(&email.trim().to_lowercase())?;
        (user.password_sha256.eq_ignore_ascii_case(&hash_password(password))).then_some(user)
    }
}
