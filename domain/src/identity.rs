use crate::error::Error;
use async_trait::async_trait;
use dashmap::DashMap;
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// An authenticated principal as known to the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

/// The principal a connection acts as. Resolved once during the handshake and
/// never changed for the lifetime of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }

    /// Staff access is also granted to superusers.
    pub fn is_staff(&self) -> bool {
        match self {
            Identity::User(user) => user.is_staff || user.is_superuser,
            Identity::Anonymous => false,
        }
    }

    pub fn is_superuser(&self) -> bool {
        match self {
            Identity::User(user) => user.is_superuser,
            Identity::Anonymous => false,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::User(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    /// Short label used in log lines.
    pub fn label(&self) -> &str {
        match self {
            Identity::User(user) => &user.id,
            Identity::Anonymous => "anonymous",
        }
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Identity::User(user)
    }
}

/// Resolves a session key into the user it belongs to.
///
/// `Ok(None)` means the key is unknown or expired; callers treat that as an
/// anonymous identity. `Err` means the store itself could not be consulted.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_user(&self, session_key: &str) -> Result<Option<User>, Error>;
}

/// Session store kept in process memory, optionally seeded from a JSON file
/// mapping session keys to user records.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, User>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let sessions: HashMap<String, User> = serde_json::from_str(json)?;
        let store = Self::new();
        for (session_key, user) in sessions {
            store.insert(session_key, user);
        }
        Ok(store)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        let store = Self::from_json(&json)?;
        info!(
            "Loaded {} session(s) from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn insert(&self, session_key: impl Into<String>, user: User) {
        self.sessions.insert(session_key.into(), user);
    }

    pub fn remove(&self, session_key: &str) -> Option<User> {
        self.sessions.remove(session_key).map(|(_, user)| user)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_user(&self, session_key: &str) -> Result<Option<User>, Error> {
        Ok(self.sessions.get(session_key).map(|user| user.clone()))
    }
}
