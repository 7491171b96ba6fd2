use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    Error,
    config::{Config, ROSTER_KEYS},
    github::IdentityProvider,
};

/// Role handed out when no roles are configured at all.
pub const MINIMAL_ROLE: &str = "viewer";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Candidate roles, highest privilege first.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct RoleList(Vec<Role>);

impl RoleList {
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(role)
    }

    pub fn find(&self, name: &str) -> Option<&Role> {
        self.0.iter().find(|role| role.as_str() == name)
    }

    pub fn owner_default(&self) -> Option<&Role> {
        self.0.first()
    }

    pub fn fallback_default(&self) -> Role {
        self.0
            .last()
            .cloned()
            .unwrap_or_else(|| Role::from(MINIMAL_ROLE))
    }
}

impl<R: Into<Role>> FromIterator<R> for RoleList {
    fn from_iter<T: IntoIterator<Item = R>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// What the roster collection said about a user.
#[derive(Debug)]
pub enum RosterLookup {
    NoRoster,
    /// The backing file could not be fetched.
    Unavailable(Error),
    /// The file was fetched but is not a JSON array of rows.
    Malformed(String),
    NotListed,
    /// A row matched but its role is missing or not configured.
    UnlistedRole(Option<String>),
    Listed(Role),
}

pub struct RoleResolver<'a, P> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: IdentityProvider> RoleResolver<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// Roster entry, then owner default, then lowest-privilege default.
    pub async fn detect_role(&self, token: &str, username: &str) -> Role {
        match self.lookup_roster(token, username).await {
            RosterLookup::Listed(role) => {
                debug!(username, role = role.as_str(), "roster_listed");
                return role;
            }
            RosterLookup::Malformed(reason) => {
                warn!(username, reason = reason.as_str(), "roster_malformed");
            }
            RosterLookup::Unavailable(e) => {
                debug!(username, e = e.to_string(), "roster_unavailable");
            }
            other => {
                debug!(username, outcome = ?other, "roster_fallthrough");
            }
        }
        self.default_role(username)
    }

    pub fn default_role(&self, username: &str) -> Role {
        if username == self.config.repo_owner {
            if let Some(role) = self.config.roles.owner_default() {
                return role.clone();
            }
        }
        self.config.roles.fallback_default()
    }

    pub async fn lookup_roster(&self, token: &str, username: &str) -> RosterLookup {
        let Some(roster) = self.config.roster() else {
            return RosterLookup::NoRoster;
        };
        let contents = match self.provider.fetch_file_contents(token, &roster.file).await {
            Ok(contents) => contents,
            Err(e) => return RosterLookup::Unavailable(e),
        };
        match contents.decode() {
            Ok(text) => match_row(&text, username, self.config),
            Err(e) => RosterLookup::Malformed(e.to_string()),
        }
    }
}

fn match_row(text: &str, username: &str, config: &Config) -> RosterLookup {
    let rows = match serde_json::from_str::<Vec<Value>>(text) {
        Ok(rows) => rows,
        Err(e) => return RosterLookup::Malformed(e.to_string()),
    };
    let row = rows.iter().find(|row| {
        ROSTER_KEYS
            .iter()
            .any(|key| row.get(key).and_then(Value::as_str) == Some(username))
    });
    let Some(row) = row else {
        return RosterLookup::NotListed;
    };
    match row.get("role").and_then(Value::as_str) {
        Some(name) => match config.roles.find(name) {
            Some(role) => RosterLookup::Listed(role.clone()),
            None => RosterLookup::UnlistedRole(Some(name.to_string())),
        },
        None => RosterLookup::UnlistedRole(None),
    }
}
