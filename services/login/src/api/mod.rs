//! HTTP surface of the Login Service.
//!
//! Routes: the OTP flow (`/auth/request-otp`, `/auth/verify-otp`), the
//! authenticated introspection route (`/auth/me`), and the operational
//! endpoints (`/health`, `/metrics`). Status codes follow the error
//! taxonomy; handlers never expose internal detail.

pub mod handlers;

use crate::otp::OtpEngine;
use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Span};
use verein_auth::TokenVerifier;

/// Shared state handed to every handler.
pub struct AppState {
    /// Passcode issuance and verification.
    pub engine: OtpEngine,
    /// Bearer-credential verification chain.
    pub verifier: TokenVerifier,
}

/// Build the service router with tracing and shared state attached.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/auth/request-otp", post(handlers::request_otp))
        .route("/auth/verify-otp", post(handlers::verify_otp))
        .route("/auth/me", get(handlers::me))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Serve the router until a shutdown signal arrives.
///
/// # Errors
///
/// Returns the underlying I/O error when the listener fails.
pub async fn serve(listener: tokio::net::TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

fn make_span(request: &Request<Body>) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!("http.request", http.method = %request.method(), http.route = route)
}

/// Resolve once ctrl-c or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
