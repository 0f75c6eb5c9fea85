//! Centralized error taxonomy for the authentication core.
//!
//! Every failure a service surfaces to a client maps onto exactly one of
//! these variants, and each variant carries a fixed HTTP status. Messages
//! are terse status text; anything that might contain secret material is
//! passed through [`sanitize_message`] before it leaves the process.

use axum::http::StatusCode;
use thiserror::Error;

/// Substrings that must never appear in a client-visible error message.
const SENSITIVE_PATTERNS: &[&str] = &[
    "secret",
    "password",
    "api_key",
    "api-key",
    "authorization",
    "private",
    "signature=",
];

/// Common error type for authentication and authorization operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AuthError {
    /// Missing or malformed client input.
    #[error("{0}")]
    Validation(String),

    /// No such identity or pending code.
    #[error("{0}")]
    NotFound(String),

    /// Credential is valid but does not grant access.
    #[error("{0}")]
    Forbidden(String),

    /// No credential, or every verification strategy declined it.
    #[error("{0}")]
    Unauthenticated(String),

    /// Attempt or refresh budget exhausted.
    #[error("{0}")]
    RateLimited(String),

    /// Key-id absent from the provider's published key set.
    #[error("no signing key for kid {kid}")]
    KeyNotFound {
        /// The key-id that could not be resolved.
        kid: String,
    },

    /// An upstream collaborator (directory, mail relay, key-set endpoint)
    /// failed or was unreachable.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// An upstream call exceeded its deadline.
    #[error("upstream timed out: {0}")]
    Timeout(String),

    /// Invalid or missing configuration, detected at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a forbidden error.
    #[must_use]
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create an unauthenticated error.
    #[must_use]
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    /// Create a rate-limited error.
    #[must_use]
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an upstream error.
    #[must_use]
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthenticated(_) | Self::KeyNotFound { .. } => StatusCode::UNAUTHORIZED,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a caller may retry the failed operation.
    ///
    /// Cryptographic and validation failures are never retryable; transient
    /// upstream failures and rate limits are.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::Timeout(_) | Self::RateLimited(_)
        )
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Unauthenticated("token expired".to_string()),
            ErrorKind::ImmatureSignature => Self::Unauthenticated("token not yet valid".to_string()),
            ErrorKind::InvalidSignature => Self::Unauthenticated("invalid signature".to_string()),
            ErrorKind::InvalidAlgorithm => Self::Unauthenticated("algorithm mismatch".to_string()),
            ErrorKind::InvalidIssuer => Self::Unauthenticated("invalid issuer".to_string()),
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Unauthenticated("malformed token".to_string()),
            _ => Self::Internal(format!("jwt: {err}")),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

/// Redact a message that may contain secret material.
///
/// Returns the message unchanged when it is safe, or a fixed generic text
/// when any sensitive marker appears in it.
#[must_use]
pub fn sanitize_message(message: &str) -> String {
    let lowered = message.to_lowercase();
    if SENSITIVE_PATTERNS.iter().any(|p| lowered.contains(p)) {
        "request failed".to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            AuthError::validation("x").http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::not_found("x").http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AuthError::forbidden("x").http_status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::unauthenticated("x").http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::rate_limited("x").http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::KeyNotFound {
                kid: "abc".to_string()
            }
            .http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::upstream("x").http_status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AuthError::upstream("down").is_retryable());
        assert!(AuthError::Timeout("slow".to_string()).is_retryable());
        assert!(AuthError::rate_limited("later").is_retryable());

        assert!(!AuthError::unauthenticated("nope").is_retryable());
        assert!(!AuthError::validation("bad").is_retryable());
        assert!(!AuthError::forbidden("no").is_retryable());
    }

    #[test]
    fn test_jwt_error_conversion() {
        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );
        assert!(matches!(AuthError::from(err), AuthError::Unauthenticated(_)));

        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::InvalidSignature,
        );
        assert!(matches!(AuthError::from(err), AuthError::Unauthenticated(_)));
    }

    #[test]
    fn test_sanitize_passes_clean_text() {
        assert_eq!(sanitize_message("invalid code"), "invalid code");
    }

    #[test]
    fn test_sanitize_redacts_sensitive_text() {
        assert_eq!(
            sanitize_message("bad secret value deadbeef"),
            "request failed"
        );
        assert_eq!(sanitize_message("API_KEY mismatch"), "request failed");
    }
}
