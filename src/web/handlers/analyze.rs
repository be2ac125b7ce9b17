// POST /analyze: batch scoring.
//
// Order of checks: client certificate chain and request signature (403),
// token gate (signed {ok:false,results:[]}), oracle availability (503),
// body shape (400/422).
// Success and gate rejection are serialized once and signed over exactly
// the bytes that go on the wire.

use std::sync::atomic::Ordering;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::batch::run_batch;
use crate::analysis::models::AnalyzeResponse;
use crate::web::{api_error, auth, AppState, ANALYZE_PATH};

pub async fn analyze(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(ca) = state.ca.as_ref() {
        match auth::verify_request(ca, ANALYZE_PATH, &body, &headers, auth::unix_now()) {
            Ok(cert) => {
                if !state.handshake_logged.swap(true, Ordering::Relaxed) {
                    info!(plugin_id = %cert.id, "Ed25519 handshake verified");
                }
            }
            Err(e) => {
                warn!(error = %e, "Rejected unauthenticated request");
                return api_error(StatusCode::FORBIDDEN, &e.to_string());
            }
        }
    }

    if !auth::token_allows(&state.config.api_token, &headers) {
        return signed_response(&state, &AnalyzeResponse::rejected());
    }

    let Some(engine) = state.engine.clone() else {
        return api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Sentiment scoring is unavailable: the polarity oracle failed to initialize",
        );
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return api_error(StatusCode::BAD_REQUEST, &format!("Invalid JSON body: {e}"));
        }
    };

    let Some(items) = payload.get("items").and_then(Value::as_array) else {
        return api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Batch mode only. Provide 'items': [{...}, ...].",
        );
    };

    let results = run_batch(engine, items.clone(), &state.batch).await;
    signed_response(
        &state,
        &AnalyzeResponse {
            ok: true,
            results,
        },
    )
}

/// Serialize once, sign those bytes, send them unchanged.
fn signed_response(state: &AppState, body: &AnalyzeResponse) -> Response {
    let bytes = match serde_json::to_vec(body) {
        Ok(b) => b,
        Err(e) => {
            return api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to serialize response: {e}"),
            );
        }
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(signer) = state.signer.as_ref() {
        let signed = match signer.headers(ANALYZE_PATH, &bytes) {
            Ok(h) => h,
            Err(e) => {
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}"));
            }
        };
        for (name, value) in signed {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from(bytes))
        .unwrap_or_else(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response"))
}
