use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use serde::Deserialize;
use url::Url;

use crate::{
    Error, Result,
    permission::PermissionLevel,
    role::{Role, RoleList},
};

pub const DEFAULT_SCOPE: &str = "repo";
pub const DEFAULT_API_ROOT: &str = "https://api.github.com";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";

/// Schema keys that mark a collection as the user→role roster.
pub const ROSTER_KEYS: [&str; 2] = ["github", "username"];

fn default_api_root() -> Url {
    Url::parse(DEFAULT_API_ROOT).expect("invalid api root URL")
}

fn default_authorize_url() -> Url {
    Url::parse(DEFAULT_AUTHORIZE_URL).expect("invalid authorize URL")
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub client_id: String,
    pub worker_url: Url,
    pub repo_owner: String,
    pub repo_name: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub roles: RoleList,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default = "default_api_root")]
    pub api_root: Url,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: Url,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Collection {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Path of the backing JSON file inside the repository.
    pub file: String,
    #[serde(default)]
    pub roles: HashMap<Role, PermissionLevel>,
    #[serde(default)]
    pub schema: Vec<Field>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Field {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl Collection {
    pub fn is_roster(&self) -> bool {
        self.schema
            .iter()
            .any(|field| ROSTER_KEYS.contains(&field.key.as_str()))
    }
}

impl Config {
    pub fn from_yaml_str(src: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let src = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&src)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("clientId", &self.client_id),
            ("repoOwner", &self.repo_owner),
            ("repoName", &self.repo_name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} cannot be empty")));
            }
        }
        let mut seen = HashSet::new();
        for role in self.roles.iter() {
            if !seen.insert(role) {
                return Err(Error::Config(format!("duplicate role {role}")));
            }
        }
        if self.roles.is_empty() {
            return Ok(());
        }
        for collection in &self.collections {
            if let Some(role) = collection.roles.keys().find(|r| !self.roles.contains(r)) {
                return Err(Error::Config(format!(
                    "collection {} grants unknown role {role}",
                    collection.id
                )));
            }
        }
        Ok(())
    }

    pub fn scope(&self) -> &str {
        self.scope
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SCOPE)
    }

    /// First collection whose schema carries a `github` or `username` field.
    pub fn roster(&self) -> Option<&Collection> {
        self.collections.iter().find(|c| c.is_roster())
    }

    pub fn collection(&self, id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Storage key prefix, unique per target repository.
    pub fn namespace(&self) -> String {
        format!("gc:{}/{}", self.repo_owner, self.repo_name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"
clientId: Iv1.abc
workerUrl: https://auth.example.workers.dev/
repoOwner: acme
repoName: data
roles: [admin, editor, viewer]
collections:
  - id: produk
    label: Produk
    file: data/produk.json
    roles: { admin: all, editor: write, viewer: read }
    schema:
      - { key: id, label: ID, type: number, auto: true, readonly: true }
      - { key: nama, label: Nama, type: text, required: true }
  - id: users
    label: Users
    file: data/users.json
    roles: { admin: all, editor: none, viewer: none }
    schema:
      - { key: id, type: number }
      - { key: github, label: GitHub, type: text }
      - { key: role, type: select, options: [admin, editor, viewer] }
"#;

    pub(crate) fn sample() -> Config {
        Config::from_yaml_str(SAMPLE).unwrap()
    }

    #[test]
    fn parses_sample_with_defaults() {
        let config = sample();
        assert_eq!(config.scope(), "repo");
        assert_eq!(config.api_root.as_str(), "https://api.github.com/");
        assert_eq!(config.namespace(), "gc:acme/data");
        assert_eq!(config.roles.len(), 3);
        let produk = config.collection("produk").unwrap();
        assert_eq!(produk.roles[&Role::from("editor")], PermissionLevel::Write);
        assert_eq!(produk.schema[1].kind.as_deref(), Some("text"));
    }

    #[test]
    fn empty_scope_means_default() {
        let src = format!("{SAMPLE}scope: \"\"\n");
        assert_eq!(Config::from_yaml_str(&src).unwrap().scope(), "repo");
    }

    #[test]
    fn roster_is_first_collection_with_user_field() {
        let config = sample();
        assert_eq!(config.roster().unwrap().id, "users");
        assert!(!config.collection("produk").unwrap().is_roster());
    }

    #[test]
    fn username_field_also_marks_roster() {
        let src = SAMPLE.replace("key: github", "key: username");
        assert_eq!(Config::from_yaml_str(&src).unwrap().roster().unwrap().id, "users");
    }

    #[test]
    fn rejects_empty_owner() {
        let src = SAMPLE.replace("repoOwner: acme", "repoOwner: \"\"");
        assert!(matches!(Config::from_yaml_str(&src), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_duplicate_roles() {
        let src = SAMPLE.replace("[admin, editor, viewer]", "[admin, admin, viewer]");
        assert!(matches!(Config::from_yaml_str(&src), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_role_map_with_unknown_role() {
        let src = SAMPLE.replace("viewer: read", "owner: read");
        assert!(matches!(Config::from_yaml_str(&src), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_unknown_permission_level() {
        let src = SAMPLE.replace("viewer: read", "viewer: sometimes");
        assert!(matches!(Config::from_yaml_str(&src), Err(Error::ConfigParse(_))));
    }
}
