use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    Error, Result,
    config::Config,
    github::{IdentityProvider, User},
    oauth::{OAuthFlow, TokenExchange},
    permission::Permissions,
    role::{Role, RoleResolver},
    store::{SessionStore, Storage},
};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub role: Role,
    pub token: String,
}

impl Session {
    pub fn permissions(&self) -> Permissions {
        Permissions::new(self.role.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Session),
}

impl From<Option<Session>> for SessionState {
    fn from(session: Option<Session>) -> Self {
        match session {
            Some(session) => Self::Authenticated(session),
            None => Self::Unauthenticated,
        }
    }
}

/// Full-page navigation performed by the host page.
pub trait Navigator {
    fn assign(&self, url: &Url);
    fn reload(&self);
}

pub struct SessionManager<P, S, N> {
    config: Config,
    provider: P,
    store: SessionStore<S>,
    navigator: N,
}

impl<P, S, N> SessionManager<P, S, N>
where
    P: IdentityProvider,
    S: Storage,
    N: Navigator,
{
    pub fn new(config: Config, provider: P, storage: S, navigator: N) -> Self {
        let store = SessionStore::for_config(storage, &config);
        Self {
            config,
            provider,
            store,
            navigator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    /// Resolves the session for this page load.
    ///
    /// A cached user and role are trusted as-is for the rest of the tab's
    /// lifetime; only a token without cache goes back to the provider.
    pub async fn init(&self) -> Result<Option<Session>> {
        let Some(token) = self.store.token() else {
            debug!("no_token");
            return Ok(None);
        };

        if let Some((user, role)) = self.store.cached() {
            debug!(user = user.login.as_str(), role = role.as_str(), "session_cached");
            return Ok(Some(Session { user, role, token }));
        }

        let user = self.provider.get_user(&token).await?;
        if !self.provider.is_collaborator(&token, &user.login).await? {
            self.store.clear();
            warn!(
                user = user.login.as_str(),
                owner = self.config.repo_owner.as_str(),
                repo = self.config.repo_name.as_str(),
                "not_collaborator"
            );
            return Err(Error::NotAuthorized {
                user: user.login,
                owner: self.config.repo_owner.clone(),
                repo: self.config.repo_name.clone(),
            });
        }

        let role = RoleResolver::new(&self.provider, &self.config)
            .detect_role(&token, &user.login)
            .await;
        self.store.persist(&user, &role)?;
        info!(user = user.login.as_str(), role = role.as_str(), "session_established");
        Ok(Some(Session { user, role, token }))
    }

    pub async fn state(&self) -> Result<SessionState> {
        Ok(self.init().await?.into())
    }

    /// Sends the browser to the provider's authorize page.
    pub fn login(&self, oauth: &OAuthFlow, current_page: &Url) {
        let url = oauth.authorization_url(current_page);
        info!(url = url.as_str(), "login_redirect");
        self.navigator.assign(&url);
    }

    /// Callback step: trade the code for a token, then establish the session.
    pub async fn complete_login<X: TokenExchange>(
        &self,
        exchange: &X,
        code: &str,
    ) -> Result<Option<Session>> {
        let token = exchange.exchange_code(code).await?;
        self.store.clear();
        self.store.set_token(&token);
        self.init().await
    }

    pub fn logout(&self) {
        self.store.clear();
        info!(
            owner = self.config.repo_owner.as_str(),
            repo = self.config.repo_name.as_str(),
            "logout"
        );
        self.navigator.reload();
    }
}
