use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{config::Collection, role::Role};

/// Capability tier a role holds over a collection, ordered `none < read < write < all`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    None,
    Read,
    Write,
    All,
}

impl PermissionLevel {
    pub const ALL_LEVELS: [PermissionLevel; 4] = [Self::None, Self::Read, Self::Write, Self::All];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
            Self::All => "all",
        }
    }
}

impl Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown permission level {0}")]
pub struct LevelParseError(String);

impl FromStr for PermissionLevel {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "all" => Ok(Self::All),
            _ => Err(LevelParseError(s.to_string())),
        }
    }
}

/// Answers read/write/delete questions for the role of the current session.
#[derive(Debug, Clone)]
pub struct Permissions {
    role: Role,
}

impl Permissions {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Roles missing from the collection's role-map get `none`.
    pub fn level(&self, collection: &Collection) -> PermissionLevel {
        collection.roles.get(&self.role).copied().unwrap_or_default()
    }

    pub fn can_read(&self, collection: &Collection) -> bool {
        self.level(collection) >= PermissionLevel::Read
    }

    pub fn can_write(&self, collection: &Collection) -> bool {
        self.level(collection) >= PermissionLevel::Write
    }

    pub fn can_delete(&self, collection: &Collection) -> bool {
        self.level(collection) >= PermissionLevel::All
    }
}
