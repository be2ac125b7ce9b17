// HTTP surface tests: /analyze and /health driven through the router
// without binding a socket.

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use ed25519_dalek::SigningKey;
use serde_json::{json, Value};
use tower::ServiceExt;

use peertone::analysis::label::LabelPolicy;
use peertone::analysis::pipeline::Engine;
use peertone::analysis::rules::Heuristics;
use peertone::config::Config;
use peertone::oracle::lexicon::LexiconOracle;
use peertone::web::auth::{
    self, API_TOKEN_HEADER, CLIENT_CERT_HEADER, CLIENT_CERT_SIG_HEADER, CLIENT_SIG_HEADER,
    SERVER_CERT_HEADER, SERVER_CERT_SIG_HEADER, SERVER_SIG_HEADER,
};
use peertone::web::{build_router, AppState};

fn engine() -> Arc<Engine> {
    let heuristics = Arc::new(Heuristics::new().expect("heuristics compile"));
    let oracle = LexiconOracle::with_extensions(heuristics.lexicon_extensions());
    Arc::new(Engine::new(
        Arc::new(oracle),
        heuristics,
        LabelPolicy::default_score_band(),
    ))
}

fn app(config: Config) -> Router {
    build_router(AppState::new(config, Some(engine())).unwrap())
}

fn post() -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

/// Far enough ahead that test certificates never expire.
const EXP: i64 = 4_000_000_000;

/// A CA with one server and one plugin key.
struct Pki {
    ca: SigningKey,
    server: SigningKey,
    client: SigningKey,
}

impl Pki {
    fn new() -> Self {
        Self {
            ca: SigningKey::from_bytes(&[11; 32]),
            server: SigningKey::from_bytes(&[22; 32]),
            client: SigningKey::from_bytes(&[33; 32]),
        }
    }

    fn ca_public(&self) -> String {
        auth::b64u_encode(self.ca.verifying_key().as_bytes())
    }

    /// Service config with request verification and response signing on.
    fn config(&self) -> Config {
        let (cert, sig) =
            auth::issue_certificate(&self.ca, auth::SERVER_CERT_ID, &self.server.verifying_key(), EXP)
                .unwrap();
        Config {
            ca_public_key: self.ca_public(),
            server_private_key: auth::b64u_encode(&self.server.to_bytes()),
            server_cert: cert,
            server_cert_sig: sig,
            ..Config::default()
        }
    }

    /// The three client headers the plugin attaches to `body`.
    fn sign_request(&self, body: &str, req: axum::http::request::Builder) -> axum::http::request::Builder {
        let (cert, cert_sig) =
            auth::issue_certificate(&self.ca, auth::CLIENT_CERT_ID, &self.client.verifying_key(), EXP)
                .unwrap();
        req.header(CLIENT_CERT_HEADER, cert)
            .header(CLIENT_CERT_SIG_HEADER, cert_sig)
            .header(CLIENT_SIG_HEADER, auth::sign(&self.client, "/analyze", body.as_bytes()))
    }

    /// Check a response the way the plugin does: the server certificate
    /// chains to the CA, names spe-api, and its key signed the body.
    fn verify_response(&self, headers: &HeaderMap, body: &[u8]) {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("");
        let cert_json = get(SERVER_CERT_HEADER);
        let cert_sig = get(SERVER_CERT_SIG_HEADER);
        let sig = get(SERVER_SIG_HEADER);
        assert!(!cert_json.is_empty() && !cert_sig.is_empty() && !sig.is_empty());

        let cert = auth::verify_certificate(&self.ca.verifying_key(), cert_json, cert_sig, auth::unix_now())
            .unwrap();
        assert_eq!(cert.id, auth::SERVER_CERT_ID);
        let server_key = auth::parse_verifying_key(&cert.pubkey).unwrap();
        assert!(auth::verify(&server_key, "/analyze", body, sig));
    }
}

const BATCH: &str = r#"{"items":[{"id":1,"text":"fine","score_total":"abc"},{"id":2,"text":"great job","score_total":7}]}"#;

// ============================================================
// Scoring
// ============================================================

#[tokio::test]
async fn analyze_returns_results_in_order() {
    let req = post().body(Body::from(BATCH)).unwrap();
    let (status, headers, body) = send(app(Config::default()), req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(SERVER_SIG_HEADER).is_none(), "signing disabled");
    assert!(headers.get(SERVER_CERT_HEADER).is_none());

    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["ok"], json!(true));
    let results = v["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], json!(1));
    assert_eq!(results[0]["disparity"], json!(false));
    assert_eq!(results[1]["id"], json!(2));
    assert_eq!(results[1]["label"], json!("positive"));
    assert_eq!(results[1]["disparity"], json!(true));
    assert_eq!(results[1]["suggest_confirm"], json!(true));
}

#[tokio::test]
async fn response_is_compact_and_signed_over_exact_bytes() {
    let pki = Pki::new();
    let req = pki.sign_request(BATCH, post()).body(Body::from(BATCH)).unwrap();
    let (status, headers, body) = send(app(pki.config()), req).await;

    assert_eq!(status, StatusCode::OK);
    pki.verify_response(&headers, &body);

    let text = String::from_utf8(body).unwrap();
    assert!(text.starts_with(r#"{"ok":true,"results":[{"label":"#));
    assert!(!text.contains(": "), "compact separators only");
}

#[tokio::test]
async fn item_level_error_does_not_fail_request() {
    let body = r#"{"items":[{"id":"a","text":7},{"id":"b","text":"poor effort"}]}"#;
    let req = post().body(Body::from(body)).unwrap();
    let (status, _, bytes) = send(app(Config::default()), req).await;

    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["results"][0]["label"], json!("neutral"));
    assert!(v["results"][0]["error"].is_string());
    assert_eq!(v["results"][1]["label"], json!("negative"));
    assert!(v["results"][1].get("error").is_none());
}

// ============================================================
// Request validation
// ============================================================

#[tokio::test]
async fn invalid_json_is_bad_request() {
    let req = post().body(Body::from("{not json")).unwrap();
    let (status, _, _) = send(app(Config::default()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_items_is_unprocessable() {
    for body in [r#"{"text":"single"}"#, r#"{"items":"nope"}"#, "[]"] {
        let req = post().body(Body::from(body)).unwrap();
        let (status, _, bytes) = send(app(Config::default()), req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(v["error"].as_str().unwrap().contains("items"));
    }
}

#[tokio::test]
async fn unavailable_oracle_is_service_unavailable() {
    let router = build_router(AppState::new(Config::default(), None).unwrap());
    let req = post().body(Body::from(BATCH)).unwrap();
    let (status, _, _) = send(router, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================
// Token gate and request signatures
// ============================================================

#[tokio::test]
async fn wrong_token_gets_signed_rejection() {
    let pki = Pki::new();
    let config = Config {
        api_token: "t0ken".to_string(),
        ..pki.config()
    };
    let req = pki
        .sign_request(BATCH, post().header(API_TOKEN_HEADER, "wrong"))
        .body(Body::from(BATCH))
        .unwrap();
    let (status, headers, body) = send(app(config), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, br#"{"ok":false,"results":[]}"#);
    pki.verify_response(&headers, &body);
}

#[tokio::test]
async fn correct_token_is_scored() {
    let config = Config {
        api_token: "t0ken".to_string(),
        ..Config::default()
    };
    let req = post()
        .header(API_TOKEN_HEADER, "t0ken")
        .body(Body::from(BATCH))
        .unwrap();
    let (status, _, body) = send(app(config), req).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["ok"], json!(true));
}

#[tokio::test]
async fn client_certificate_chain_is_enforced() {
    let pki = Pki::new();

    let unsigned = post().body(Body::from(BATCH)).unwrap();
    let (status, _, body) = send(app(pki.config()), unsigned).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert!(v["error"].as_str().unwrap().contains("Missing client certificate"));

    let signed = pki.sign_request(BATCH, post()).body(Body::from(BATCH)).unwrap();
    let (status, _, _) = send(app(pki.config()), signed).await;
    assert_eq!(status, StatusCode::OK);

    let tampered = BATCH.replace("great", "poor");
    let req = pki.sign_request(BATCH, post()).body(Body::from(tampered)).unwrap();
    let (status, _, _) = send(app(pki.config()), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn certificate_from_another_ca_is_rejected() {
    let pki = Pki::new();
    let rogue = Pki {
        ca: SigningKey::from_bytes(&[44; 32]),
        ..Pki::new()
    };
    let req = rogue.sign_request(BATCH, post()).body(Body::from(BATCH)).unwrap();
    let (status, _, body) = send(app(pki.config()), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert!(v["error"].as_str().unwrap().contains("certificate signature"));
}

#[test]
fn partial_signing_config_fails_startup() {
    let config = Config {
        server_cert_sig: String::new(),
        ..Pki::new().config()
    };
    assert!(AppState::new(config, Some(engine())).is_err());
}

// ============================================================
// Health
// ============================================================

#[tokio::test]
async fn health_reports_engine_and_oracle() {
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app(Config::default()), req).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["status"], json!("ok"));
    assert_eq!(v["engine"], json!("lexicon"));
    assert_eq!(v["oracle"], json!("lexicon"));
}

#[tokio::test]
async fn health_reports_missing_oracle() {
    let router = build_router(AppState::new(Config::default(), None).unwrap());
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (_, _, body) = send(router, req).await;
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["oracle"], json!("unavailable"));
}
