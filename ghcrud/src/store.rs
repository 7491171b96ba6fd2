use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tracing::warn;

use crate::{Result, config::Config, github::User, role::Role};

/// Flat string key/value storage scoped to one browser tab.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local storage. Clones share the same map, like handles to one tab's session storage.
#[derive(Clone, Default, Debug)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys = entries.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    Token,
    User,
    Role,
}

impl SessionField {
    pub const ALL: [SessionField; 3] = [Self::Token, Self::User, Self::Role];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::User => "user",
            Self::Role => "role",
        }
    }
}

/// Session fields of one target repository, keyed `gc:{owner}/{repo}:{field}`.
#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    storage: S,
    namespace: String,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    pub fn for_config(storage: S, config: &Config) -> Self {
        Self::new(storage, config.namespace())
    }

    pub fn key(&self, field: SessionField) -> String {
        format!("{}:{}", self.namespace, field.as_str())
    }

    pub fn get(&self, field: SessionField) -> Option<String> {
        self.storage.get(&self.key(field))
    }

    pub fn set(&self, field: SessionField, value: &str) {
        self.storage.set(&self.key(field), value)
    }

    pub fn clear(&self) {
        for field in SessionField::ALL {
            self.storage.remove(&self.key(field));
        }
    }

    pub fn token(&self) -> Option<String> {
        self.get(SessionField::Token)
    }

    pub fn set_token(&self, token: &str) {
        self.set(SessionField::Token, token)
    }

    /// User and role from a previous init. Both must be present and the user must decode.
    pub fn cached(&self) -> Option<(User, Role)> {
        let user = self.get(SessionField::User)?;
        let role = self.get(SessionField::Role)?;
        match serde_json::from_str::<User>(&user) {
            Ok(user) => Some((user, Role::from(role))),
            Err(e) => {
                warn!(
                    namespace = self.namespace.as_str(),
                    e = e.to_string(),
                    "cached_user_unreadable"
                );
                None
            }
        }
    }

    pub fn persist(&self, user: &User, role: &Role) -> Result<()> {
        self.set(SessionField::User, &serde_json::to_string(user)?);
        self.set(SessionField::Role, role.as_str());
        Ok(())
    }
}
