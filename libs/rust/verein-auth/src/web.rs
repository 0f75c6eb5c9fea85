//! HTTP glue: header extraction and error responses.

use crate::error::{sanitize_message, AuthError};
use crate::verifier::Credentials;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Header carrying the internal shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

impl Credentials {
    /// Pull credential material out of request headers.
    ///
    /// The `Authorization` header only contributes a token when it uses the
    /// `Bearer` scheme; other schemes are ignored rather than rejected so
    /// that the verifier sees a uniform "no bearer token" state.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let api_key = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_owned);

        Self { api_key, bearer }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let message = sanitize_message(&self.to_string());
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::HeaderValue;
    use axum::http::StatusCode;

    #[test]
    fn test_extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        let credentials = Credentials::from_headers(&headers);
        assert_eq!(credentials.bearer.as_deref(), Some("abc.def.ghi"));
        assert!(credentials.api_key.is_none());
    }

    #[test]
    fn test_extracts_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("shared-key"));
        let credentials = Credentials::from_headers(&headers);
        assert_eq!(credentials.api_key.as_deref(), Some("shared-key"));
        assert!(credentials.bearer.is_none());
    }

    #[test]
    fn test_ignores_non_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        let credentials = Credentials::from_headers(&headers);
        assert!(credentials.bearer.is_none());
        assert!(credentials.is_empty());
    }

    #[test]
    fn test_empty_bearer_is_no_credential() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        let credentials = Credentials::from_headers(&headers);
        assert!(credentials.bearer.is_none());
    }

    #[tokio::test]
    async fn test_error_response_status_and_body() {
        let response = AuthError::rate_limited("too many attempts").into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "too many attempts");
    }

    #[tokio::test]
    async fn test_error_response_redacts_sensitive_detail() {
        let response =
            AuthError::internal("session secret failed to load").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "request failed");
    }
}
