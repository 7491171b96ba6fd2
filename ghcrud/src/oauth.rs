//! Authorization redirect and code exchange.
//!
//! The browser never sees the client secret: codes are posted to a trusted
//! exchange endpoint (`{workerUrl}/exchange`) which talks to the provider.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{
    Error, Result,
    config::Config,
    error::TOKEN_NOT_RECEIVED,
};

/// Page the provider redirects back to when no explicit redirect URI is configured.
pub const CALLBACK_PAGE: &str = "callback.html";

/// Turns an authorization code into an access token.
pub trait TokenExchange {
    fn exchange_code(&self, code: &str) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OAuthFlow {
    client_id: String,
    redirect_uri: Option<String>,
    scope: String,
    authorize_url: Url,
    exchange_url: Url,
    http: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone().filter(|uri| !uri.is_empty()),
            scope: config.scope().to_string(),
            authorize_url: config.authorize_url.clone(),
            exchange_url: exchange_endpoint(&config.worker_url)?,
            http: reqwest::Client::new(),
        })
    }

    pub fn exchange_url(&self) -> &Url {
        &self.exchange_url
    }

    /// Configured redirect URI, or `callback.html` next to the current page.
    pub fn redirect_uri(&self, current_page: &Url) -> String {
        match &self.redirect_uri {
            Some(uri) => uri.clone(),
            None => callback_uri(current_page),
        }
    }

    pub fn authorization_url(&self, current_page: &Url) -> Url {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri(current_page))
            .append_pair("scope", &self.scope);
        url
    }
}

impl TokenExchange for OAuthFlow {
    async fn exchange_code(&self, code: &str) -> Result<String> {
        debug!(url = self.exchange_url.as_str(), "token_exchange");
        let body = self
            .http
            .post(self.exchange_url.clone())
            .json(&ExchangeRequest { code })
            .send()
            .await?
            .text()
            .await?;
        parse_exchange_response(&body).inspect_err(|e| {
            warn!(e = e.to_string(), "token_exchange_failed");
        })
    }
}

fn exchange_endpoint(worker_url: &Url) -> Result<Url> {
    let base = worker_url.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/exchange"))?)
}

fn callback_uri(current_page: &Url) -> String {
    let path = current_page.path();
    let dir = path.rfind('/').map_or("", |i| &path[..i]);
    format!(
        "{}{dir}/{CALLBACK_PAGE}",
        current_page.origin().ascii_serialization()
    )
}

/// Accepts `{"access_token": ...}`; anything else is an [`Error::AuthExchange`]
/// carrying the endpoint's `error` text when it sent one.
pub fn parse_exchange_response(body: &str) -> Result<String> {
    let response = serde_json::from_str::<ExchangeResponse>(body)
        .map_err(|_| Error::AuthExchange(TOKEN_NOT_RECEIVED.to_string()))?;
    match response.access_token.filter(|token| !token.is_empty()) {
        Some(token) => Ok(token),
        None => Err(Error::AuthExchange(
            response
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| TOKEN_NOT_RECEIVED.to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(extra: &str) -> OAuthFlow {
        let src = format!("{}{extra}", crate::config::tests::SAMPLE);
        OAuthFlow::new(&Config::from_yaml_str(&src).unwrap()).unwrap()
    }

    fn page(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn derives_callback_next_to_current_page() {
        let flow = flow("");
        assert_eq!(
            flow.redirect_uri(&page("https://acme.github.io/app/index.html?x=1#top")),
            "https://acme.github.io/app/callback.html"
        );
        assert_eq!(
            flow.redirect_uri(&page("https://acme.github.io/app/")),
            "https://acme.github.io/app/callback.html"
        );
        assert_eq!(
            flow.redirect_uri(&page("http://localhost:5173/")),
            "http://localhost:5173/callback.html"
        );
    }

    #[test]
    fn explicit_redirect_uri_wins() {
        let flow = flow("redirectUri: https://acme.dev/done\n");
        assert_eq!(
            flow.redirect_uri(&page("https://acme.github.io/app/index.html")),
            "https://acme.dev/done"
        );
    }

    #[test]
    fn empty_scope_and_redirect_fall_back() {
        let flow = flow("redirectUri: \"\"\nscope: \"\"\n");
        let url = flow.authorization_url(&page("https://acme.github.io/app/index.html"));
        let pairs = url.query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(
            pairs[1..].to_vec(),
            vec![
                (
                    "redirect_uri".to_string(),
                    "https://acme.github.io/app/callback.html".to_string()
                ),
                ("scope".to_string(), "repo".to_string()),
            ]
        );
    }

    #[test]
    fn authorization_url_carries_client_redirect_and_scope() {
        let flow = flow("");
        let url = flow.authorization_url(&page("https://acme.github.io/app/index.html"));
        assert_eq!(url.origin().ascii_serialization(), "https://github.com");
        assert_eq!(url.path(), "/login/oauth/authorize");
        let pairs = url.query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(
            pairs,
            vec![
                ("client_id".to_string(), "Iv1.abc".to_string()),
                (
                    "redirect_uri".to_string(),
                    "https://acme.github.io/app/callback.html".to_string()
                ),
                ("scope".to_string(), "repo".to_string()),
            ]
        );
    }

    #[test]
    fn custom_scope_is_requested() {
        let flow = flow("scope: public_repo read:user\n");
        let url = flow.authorization_url(&page("https://acme.github.io/"));
        assert!(url.as_str().ends_with("scope=public_repo+read%3Auser"));
    }

    #[test]
    fn exchange_endpoint_ignores_trailing_slash() {
        assert_eq!(
            flow("").exchange_url().as_str(),
            "https://auth.example.workers.dev/exchange"
        );
        let worker = page("https://auth.example.dev/api/");
        assert_eq!(
            exchange_endpoint(&worker).unwrap().as_str(),
            "https://auth.example.dev/api/exchange"
        );
    }

    #[test]
    fn parses_access_token() {
        assert_eq!(
            parse_exchange_response(r#"{"access_token":"abc"}"#).unwrap(),
            "abc"
        );
    }

    #[test]
    fn surfaces_reported_error() {
        let e = parse_exchange_response(r#"{"error":"bad_code"}"#).unwrap_err();
        assert!(matches!(e, Error::AuthExchange(ref m) if m == "bad_code"));
    }

    #[test]
    fn generic_message_without_token_or_error() {
        for body in [r#"{}"#, r#"{"access_token":""}"#, "<html>502</html>", r#"{"access_token":5}"#] {
            let e = parse_exchange_response(body).unwrap_err();
            assert!(matches!(e, Error::AuthExchange(ref m) if m == TOKEN_NOT_RECEIVED));
        }
    }
}
