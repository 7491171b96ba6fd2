use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The exchange endpoint answered without a usable access token.
    #[error("{0}")]
    AuthExchange(String),
    #[error("failed to fetch the GitHub profile (HTTP {status}), please log in again")]
    IdentityFetch { status: StatusCode },
    /// Authenticated, but not a collaborator. Session storage is already cleared.
    #[error("@{user} is not a collaborator of {owner}/{repo}")]
    NotAuthorized {
        user: String,
        owner: String,
        repo: String,
    },
    #[error("failed to fetch {path} (HTTP {status})")]
    ContentFetch { path: String, status: StatusCode },
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

pub(crate) const TOKEN_NOT_RECEIVED: &str = "access token not received from the exchange endpoint";

/// Turns a non-success response into an error built from its status.
pub trait ResponseValidatable: Sized {
    fn validate_with<F>(self, on_error: F) -> Result<Self>
    where
        F: FnOnce(StatusCode) -> Error;
}

impl ResponseValidatable for reqwest::Response {
    fn validate_with<F>(self, on_error: F) -> Result<Self>
    where
        F: FnOnce(StatusCode) -> Error,
    {
        if self.status().is_success() {
            Ok(self)
        } else {
            Err(on_error(self.status()))
        }
    }
}
