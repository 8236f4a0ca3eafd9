//! Route handlers.
//!
//! Thin translation between HTTP and the admission gate: resolve the
//! caller's address and credential, invoke the gate, map the outcome to
//! a status code. All policy lives in the gate.

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use chrono::Utc;
use std::net::SocketAddr;

use crate::admission::AdmissionOutcome;
use crate::http::auth::extract_credential;
use crate::http::client_ip::{client_ip, device_label};
use crate::http::server::AppState;

/// Home route: redirect to an https:// target, or render the configured
/// message inline. Never authenticated.
pub async fn home(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers, peer, state.server.trust_proxy);
    tracing::info!(client = %ip, "Home request");

    let home = &state.server.home;
    if home.starts_with("https://") {
        Redirect::temporary(home).into_response()
    } else {
        Html(format!(
            "<html><head><title>allowgate</title></head><body><center>{home}</center></body></html>"
        ))
        .into_response()
    }
}

/// Admission route: add the caller's address to the allow list.
pub async fn allow(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers, peer, state.server.trust_proxy);
    let credential = extract_credential(&headers);
    let label = device_label(&headers);

    match state.gate.admit(&ip, credential, &label, Utc::now()).await {
        Ok(AdmissionOutcome::Granted {
            identity,
            newly_added,
        }) => (StatusCode::OK, format!("Add {identity}: {newly_added}")).into_response(),
        Ok(outcome) => refusal_response(outcome),
        Err(err) => {
            tracing::error!(client = %ip, error = %err, "Admission failed upstream");
            (StatusCode::BAD_GATEWAY, format!("Failed to add: {ip}")).into_response()
        }
    }
}

/// Revocation route: remove the caller's address from the allow list.
pub async fn block(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers, peer, state.server.trust_proxy);
    let credential = extract_credential(&headers);

    if let Err(outcome) = state.gate.authorize(&ip, &credential, Utc::now()) {
        return refusal_response(outcome);
    }

    match state.gate.revoke(&ip).await {
        Ok(outcome) => {
            use crate::admission::RevokeOutcome::*;
            match outcome {
                Removed { identity } => {
                    (StatusCode::OK, format!("Remove {identity}: true")).into_response()
                }
                NotFound { identity } => {
                    (StatusCode::OK, format!("Remove {identity}: false")).into_response()
                }
                Invalid => refusal_response(AdmissionOutcome::Invalid),
            }
        }
        Err(err) => {
            tracing::error!(client = %ip, error = %err, "Revocation failed upstream");
            (StatusCode::BAD_GATEWAY, format!("Failed to remove: {ip}")).into_response()
        }
    }
}

/// Operator route: active bans as identity → banned-at.
pub async fn banned(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers, peer, state.server.trust_proxy);
    let credential = extract_credential(&headers);

    if let Err(outcome) = state.gate.authorize(&ip, &credential, Utc::now()) {
        return refusal_response(outcome);
    }

    Json(state.gate.list_banned()).into_response()
}

fn refusal_response(outcome: AdmissionOutcome) -> Response {
    match outcome {
        AdmissionOutcome::Denied => (StatusCode::UNAUTHORIZED, "Access denied").into_response(),
        AdmissionOutcome::Unauthorized => {
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
        AdmissionOutcome::Prompt => (
            StatusCode::UNAUTHORIZED,
            [("WWW-Authenticate", "Basic realm=\"allowgate\"")],
            "Authentication required",
        )
            .into_response(),
        AdmissionOutcome::Invalid => (StatusCode::BAD_REQUEST, "Invalid address").into_response(),
        AdmissionOutcome::Granted { .. } => {
            // authorize() never refuses with a grant; treat as a bug.
            (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected outcome").into_response()
        }
    }
}
