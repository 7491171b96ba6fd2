//! GitHub login and role based permissions for apps whose data lives in a repository.
//!
//! A page load goes through [`SessionManager::init`], which either returns the
//! cached session, establishes a new one (profile, collaborator check, role
//! lookup) or reports that the user has to log in. [`Permissions`] then
//! answers read/write/delete questions for the resolved role.

pub mod config;
pub mod error;
pub mod github;
pub mod oauth;
pub mod permission;
pub mod role;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Collection, Config, Field};
pub use error::{Error, Result};
pub use github::{FileContents, GitHubClient, IdentityProvider, User};
pub use oauth::{OAuthFlow, TokenExchange};
pub use permission::{PermissionLevel, Permissions};
pub use role::{Role, RoleList, RoleResolver, RosterLookup};
pub use session::{Navigator, Session, SessionManager, SessionState};
pub use store::{MemoryStorage, SessionField, SessionStore, Storage};
