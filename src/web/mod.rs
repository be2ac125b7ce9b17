// Web server: Axum-based scoring service for the learning-platform plugin.
//
// POST /analyze scores a batch of comments; GET /health reports which
// engine is loaded. When the oracle failed to initialize the server still
// starts and /analyze answers 503, so the plugin sees a clear outage rather
// than silently different scores.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use ed25519_dalek::VerifyingKey;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analysis::batch::BatchOptions;
use crate::analysis::pipeline::Engine;
use crate::config::Config;

pub mod auth;
pub mod handlers;

/// Path covered by request and response signatures.
pub const ANALYZE_PATH: &str = "/analyze";

/// 2000 comments with generous text fit well under this.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// None when the oracle could not be built at startup
    pub engine: Option<Arc<Engine>>,
    pub config: Arc<Config>,
    pub batch: BatchOptions,
    /// Client certificates must chain to this key (None: unverified)
    pub ca: Option<VerifyingKey>,
    /// Response signer (None: responses go out unsigned)
    pub signer: Option<Arc<auth::ServerSigner>>,
    /// Set after the first verified client request has been logged
    pub handshake_logged: Arc<AtomicBool>,
}

impl AppState {
    /// Build state from config, parsing the CA and server key material.
    pub fn new(config: Config, engine: Option<Arc<Engine>>) -> Result<Self> {
        let batch = BatchOptions {
            max_items: config.max_batch,
            concurrency: config.concurrency,
            item_timeout: config.item_timeout,
        };
        let ca = if config.ca_public_key.is_empty() {
            None
        } else {
            Some(
                auth::parse_verifying_key(&config.ca_public_key)
                    .context("PEERTONE_CA_PUB_B64 is not a valid Ed25519 public key")?,
            )
        };
        let signer = auth::ServerSigner::from_config(&config)?.map(Arc::new);
        if ca.is_none() {
            warn!("PEERTONE_CA_PUB_B64 not set: client requests are not verified");
        }
        if signer.is_none() {
            warn!("Server key material not set: responses are not signed");
        }
        Ok(Self {
            engine,
            config: Arc::new(config),
            batch,
            ca,
            signer,
            handshake_logged: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(config: Config, engine: Option<Arc<Engine>>) -> Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let app = build_router(AppState::new(config, engine)?);

    info!("peertone listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(ANALYZE_PATH, post(handlers::analyze::analyze))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static(auth::API_TOKEN_HEADER),
                    header::HeaderName::from_static(auth::CLIENT_CERT_HEADER),
                    header::HeaderName::from_static(auth::CLIENT_CERT_SIG_HEADER),
                    header::HeaderName::from_static(auth::CLIENT_SIG_HEADER),
                ])
                .expose_headers([
                    header::HeaderName::from_static(auth::SERVER_CERT_HEADER),
                    header::HeaderName::from_static(auth::SERVER_CERT_SIG_HEADER),
                    header::HeaderName::from_static(auth::SERVER_SIG_HEADER),
                ]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness plus the loaded engine.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let oracle = state
        .engine
        .as_ref()
        .map(|e| e.oracle_name())
        .unwrap_or("unavailable");
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({
            "status": "ok",
            "engine": state.config.engine.as_str(),
            "oracle": oracle,
            "label_policy": state.config.label_policy.as_str(),
            "verifies_requests": state.ca.is_some(),
            "signs_responses": state.signer.is_some(),
        })),
    )
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}
