use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use base64::Engine as _;
use reqwest::StatusCode;
use url::Url;

use crate::{
    Error, Result,
    github::{FileContents, IdentityProvider, User},
    oauth::TokenExchange,
    session::Navigator,
};

pub(crate) fn user(login: &str) -> User {
    User {
        id: 7,
        login: login.to_string(),
        name: None,
        avatar_url: format!("https://avatars.example/{login}"),
    }
}

/// In-memory identity provider counting every call it receives.
#[derive(Default)]
pub(crate) struct FakeProvider {
    user: Option<User>,
    collaborator: bool,
    roster: Option<String>,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn with_user(mut self, login: &str) -> Self {
        self.user = Some(user(login));
        self
    }

    pub(crate) fn collaborator(mut self, collaborator: bool) -> Self {
        self.collaborator = collaborator;
        self
    }

    pub(crate) fn with_roster(self, json: &str) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        self.with_raw_roster(&encoded)
    }

    pub(crate) fn with_raw_roster(mut self, content: &str) -> Self {
        self.roster = Some(content.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityProvider for FakeProvider {
    async fn get_user(&self, _token: &str) -> Result<User> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.user.clone().ok_or(Error::IdentityFetch {
            status: StatusCode::UNAUTHORIZED,
        })
    }

    async fn is_collaborator(&self, _token: &str, _username: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.collaborator)
    }

    async fn fetch_file_contents(&self, _token: &str, path: &str) -> Result<FileContents> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.roster {
            Some(content) => Ok(FileContents {
                path: path.to_string(),
                sha: None,
                encoding: Some("base64".into()),
                content: content.clone(),
            }),
            None => Err(Error::ContentFetch {
                path: path.to_string(),
                status: StatusCode::NOT_FOUND,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Navigation {
    Assign(Url),
    Reload,
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    pub(crate) history: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub(crate) fn history(&self) -> Vec<Navigation> {
        self.history.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn assign(&self, url: &Url) {
        self.history.lock().unwrap().push(Navigation::Assign(url.clone()));
    }

    fn reload(&self) {
        self.history.lock().unwrap().push(Navigation::Reload);
    }
}

/// Token exchange answering from a fixed table.
pub(crate) struct FakeExchange {
    pub(crate) token: Option<String>,
}

impl TokenExchange for FakeExchange {
    async fn exchange_code(&self, code: &str) -> Result<String> {
        self.token
            .clone()
            .ok_or_else(|| Error::AuthExchange(format!("{code} rejected")))
    }
}
