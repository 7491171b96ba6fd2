use base64::Engine as _;
use reqwest::{
    StatusCode,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    Error, Result,
    config::Config,
    error::ResponseValidatable,
};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const CLIENT_USER_AGENT: &str = concat!("ghcrud/", env!("CARGO_PKG_VERSION"));

/// Profile returned by `GET /user`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[serde(default)]
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: String,
}

/// Content wrapper returned by `GET /repos/{owner}/{repo}/contents/{path}`.
#[derive(Deserialize, Debug, Clone)]
pub struct FileContents {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ContentDecodeError {
    #[error("unsupported content encoding {0}")]
    UnsupportedEncoding(String),
    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("content is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl FileContents {
    /// Decodes the base64 payload; GitHub wraps it at 60 columns.
    pub fn decode(&self) -> Result<String, ContentDecodeError> {
        if let Some(encoding) = self.encoding.as_deref() {
            if encoding != "base64" {
                return Err(ContentDecodeError::UnsupportedEncoding(encoding.to_string()));
            }
        }
        let packed = self
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>();
        let bytes = base64::engine::general_purpose::STANDARD.decode(packed)?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Calls against the identity provider made on behalf of a bearer token.
pub trait IdentityProvider {
    fn get_user(&self, token: &str) -> impl Future<Output = Result<User>> + Send;
    /// `true` only for HTTP 204. Any other status, including rate limiting, reads as `false`.
    fn is_collaborator(
        &self,
        token: &str,
        username: &str,
    ) -> impl Future<Output = Result<bool>> + Send;
    fn fetch_file_contents(
        &self,
        token: &str,
        path: &str,
    ) -> impl Future<Output = Result<FileContents>> + Send;
}

#[derive(Clone, Debug)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_root: Url,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            api_root: config.api_root.clone(),
            owner: config.repo_owner.clone(),
            repo: config.repo_name.clone(),
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.api_root.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("api root {} cannot be a base", self.api_root)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_endpoint<'a>(&'a self, rest: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        self.endpoint(
            ["repos", self.owner.as_str(), self.repo.as_str()]
                .into_iter()
                .chain(rest),
        )
    }
}

impl IdentityProvider for GitHubClient {
    async fn get_user(&self, token: &str) -> Result<User> {
        let user = self
            .http
            .get(self.endpoint(["user"])?)
            .bearer_auth(token)
            .send()
            .await?
            .validate_with(|status| Error::IdentityFetch { status })?
            .json::<User>()
            .await?;
        Ok(user)
    }

    async fn is_collaborator(&self, token: &str, username: &str) -> Result<bool> {
        let url = self.repo_endpoint(["collaborators", username])?;
        let status = self.http.get(url).bearer_auth(token).send().await?.status();
        debug!(username, status = status.as_u16(), "collaborator_check");
        Ok(status == StatusCode::NO_CONTENT)
    }

    async fn fetch_file_contents(&self, token: &str, path: &str) -> Result<FileContents> {
        let segments = path.split('/').filter(|s| !s.is_empty());
        let url = self.repo_endpoint(["contents"].into_iter().chain(segments))?;
        let contents = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .validate_with(|status| Error::ContentFetch {
                path: path.to_string(),
                status,
            })?
            .json::<FileContents>()
            .await?;
        Ok(contents)
    }
}
