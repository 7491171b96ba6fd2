use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{self, rejection::JsonRejection},
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    routing,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

mod error;

use error::{ExchangeError, ToExchangeError};

const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const TOKEN_NOT_RECEIVED: &str = "access token not received from provider";

#[derive(Parser)]
struct Opts {
    #[clap(long, env, default_value = "127.0.0.1:8787")]
    addr: SocketAddr,
    #[clap(long, env)]
    client_id: String,
    #[clap(long, env, hide_env_values = true)]
    client_secret: String,
    #[clap(long, env, default_value = GITHUB_TOKEN_URL)]
    token_url: Url,
    /// Origins allowed to call /exchange. Any origin when empty.
    #[clap(long, env, value_delimiter = ',')]
    allow_origin: Vec<String>,
}

#[derive(Clone)]
struct State {
    http: reqwest::Client,
    client_id: Arc<str>,
    client_secret: Arc<str>,
    token_url: Url,
}

#[derive(Deserialize)]
struct ExchangeRequest {
    code: String,
}

#[derive(Serialize, Debug)]
struct ExchangeResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ProviderTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

async fn exchange(
    extract::State(state): extract::State<State>,
    req: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangeResponse>, ExchangeError> {
    let Json(req) = req.map_err(|e| ExchangeError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
    if req.code.trim().is_empty() {
        return Err(ExchangeError::new(StatusCode::BAD_REQUEST, "code is required"));
    }
    let access_token = request_token(&state, &req.code).await.inspect_err(|e| {
        warn!(
            status = e.status.as_u16(),
            verbose = e.verbose_message.as_str(),
            "exchange_failed"
        );
    })?;
    info!("token_exchanged");
    Ok(Json(ExchangeResponse { access_token }))
}

async fn request_token(state: &State, code: &str) -> Result<String, ExchangeError> {
    let response = state
        .http
        .post(state.token_url.clone())
        .header(header::ACCEPT, "application/json")
        .form(&[
            ("client_id", state.client_id.as_ref()),
            ("client_secret", state.client_secret.as_ref()),
            ("code", code),
        ])
        .send()
        .await
        .exchange_error(StatusCode::BAD_GATEWAY, "token endpoint unreachable")?
        .json::<ProviderTokenResponse>()
        .await
        .exchange_error(StatusCode::BAD_GATEWAY, TOKEN_NOT_RECEIVED)?;

    if let Some(access_token) = response.access_token.filter(|t| !t.is_empty()) {
        return Ok(access_token);
    }
    let reported = response
        .error_description
        .or(response.error)
        .filter(|e| !e.is_empty());
    Err(match reported {
        Some(message) => ExchangeError::new(StatusCode::BAD_REQUEST, message),
        None => ExchangeError::new(StatusCode::BAD_GATEWAY, TOKEN_NOT_RECEIVED),
    })
}

async fn access_log_on_request(
    req: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    info!(method, path, status = response.status().as_u16(), "access");
    response
}

fn cors(allow_origin: &[String]) -> anyhow::Result<CorsLayer> {
    if allow_origin.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = allow_origin
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

fn app(state: State, cors: CorsLayer) -> Router {
    Router::new()
        .route("/exchange", routing::post(exchange))
        .layer(cors)
        .layer(axum::middleware::from_fn(access_log_on_request))
        .with_state(state)
}

#[cfg(unix)]
async fn wait_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigint = signal(SignalKind::interrupt()).expect("sigint handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("sigterm handler");
    let mut sighup = signal(SignalKind::hangup()).expect("sighup handler");
    tokio::select! {
        Some(()) = sigint.recv() => (),
        Some(()) = sigterm.recv() => (),
        Some(()) = sighup.recv() => (),
    }
}

#[cfg(not(unix))]
async fn wait_shutdown() {
    tokio::signal::ctrl_c().await.expect("ctrl_c")
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let state = State {
        http: reqwest::Client::new(),
        client_id: opts.client_id.into(),
        client_secret: opts.client_secret.into(),
        token_url: opts.token_url,
    };
    let app = app(state, cors(&opts.allow_origin)?);

    info!(addr = opts.addr.to_string(), "init");

    let stream = TcpListener::bind(opts.addr).await?;
    axum::serve(stream, app.into_make_service())
        .with_graceful_shutdown(wait_shutdown())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    let opts = Opts::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ghcrud_exchange=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    if let Err(e) = run(opts).await {
        error!(e = e.to_string(), "error");
        std::process::exit(1);
    }
}
