//! Request handlers for the login service routes.
//!
//! The OTP endpoints speak the member portal's wire format: camelCase
//! fields, `{"error": ...}` bodies on failure, and German status text for
//! everything a member sees.

use super::AppState;
use crate::metrics;
use axum::extract::Extension;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use verein_auth::{AuthError, Credentials};

/// Body of `POST /auth/request-otp`.
#[derive(Debug, Deserialize)]
pub struct RequestOtpBody {
    /// Email address to send a passcode to.
    pub email: String,
}

/// Body of `POST /auth/verify-otp`.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpBody {
    /// Email address the passcode was issued for.
    pub email: String,
    /// The submitted passcode.
    pub otp: String,
}

/// Success body of `POST /auth/request-otp`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOtpResponse {
    /// Always `true` on this path.
    pub success: bool,
    /// Member-facing status text.
    pub message: String,
    /// Seconds until the passcode expires.
    pub expires_in: u64,
}

/// Member fields echoed back after a verified login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    /// Full display name.
    pub name: String,
    /// First name.
    pub vorname: String,
    /// Family name.
    pub nachname: String,
    /// Contact email.
    pub email: String,
}

/// Success body of `POST /auth/verify-otp`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    /// Always `true` on this path.
    pub success: bool,
    /// Signed session token.
    pub token: String,
    /// Role carried by the session.
    pub role: String,
    /// Seconds until the session expires.
    pub expires_in: u64,
    /// The member the session was issued for.
    pub member_summary: MemberSummary,
}

/// `POST /auth/request-otp` — issue a passcode and send it by email.
pub async fn request_otp(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RequestOtpBody>>,
) -> impl IntoResponse {
    let Some(Json(body)) = payload else {
        return AuthError::validation("E-Mail ist erforderlich").into_response();
    };

    match state.engine.request_code(&body.email).await {
        Ok(expires_in) => (
            StatusCode::OK,
            Json(RequestOtpResponse {
                success: true,
                message: "Code wurde per E-Mail versendet".to_string(),
                expires_in: expires_in.as_secs(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// `POST /auth/verify-otp` — redeem a passcode for a session token.
pub async fn verify_otp(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<VerifyOtpBody>>,
) -> impl IntoResponse {
    let Some(Json(body)) = payload else {
        return AuthError::validation("E-Mail und Code sind erforderlich").into_response();
    };

    match state.engine.verify_code(&body.email, &body.otp).await {
        Ok(login) => (
            StatusCode::OK,
            Json(VerifyOtpResponse {
                success: true,
                token: login.token,
                role: login.role,
                expires_in: login.expires_in,
                member_summary: MemberSummary {
                    name: login.member.full_name(),
                    vorname: login.member.vorname,
                    nachname: login.member.nachname,
                    email: login.member.email,
                },
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// `GET /auth/me` — the resolved principal behind the presented credential.
///
/// This is the same verification chain every platform service runs in front
/// of its own routes.
pub async fn me(state: Extension<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let credentials = Credentials::from_headers(&headers);

    match state.verifier.verify(&credentials).await {
        Ok(principal) => {
            metrics::record_auth_decision(principal.source.as_str(), "accepted");
            (StatusCode::OK, Json(principal)).into_response()
        }
        Err(err) => {
            let outcome = if err.is_retryable() { "error" } else { "rejected" };
            metrics::record_auth_decision("none", outcome);
            err.into_response()
        }
    }
}

/// `GET /health` — liveness, unauthenticated.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %err, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}
