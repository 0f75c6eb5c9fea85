//! Internal session token issuance.
//!
//! Sessions are symmetric (HS256), short-lived, and stateless: nothing is
//! persisted at issue time, so a token cannot be revoked before its natural
//! expiry. That trade-off is accepted for the 1-hour default lifetime.

use crate::config::AuthConfig;
use crate::error::AuthError;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Marker value carried in the `type` claim of every internal session token.
pub const SESSION_TOKEN_TYPE: &str = "internal-session";

/// Claims of an internal session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject identity (email).
    pub sub: String,
    /// Resolved role at login time.
    pub role: String,
    /// Group memberships derived from the role.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Token type marker; must equal [`SESSION_TOKEN_TYPE`].
    #[serde(rename = "type")]
    pub token_type: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

impl SessionClaims {
    /// Build claims for a new session expiring after `ttl`.
    #[must_use]
    pub fn new(identity: &str, role: &str, groups: Vec<String>, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            sub: identity.to_string(),
            role: role.to_string(),
            groups,
            token_type: SESSION_TOKEN_TYPE.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Whether the `type` marker identifies this as an internal session.
    #[must_use]
    pub fn has_session_marker(&self) -> bool {
        self.token_type == SESSION_TOKEN_TYPE
    }
}

/// A freshly minted session token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Compact JWT.
    pub token: String,
    /// Seconds until expiry.
    pub expires_in: u64,
}

/// Mints internal session tokens.
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    /// Create an issuer from the shared configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(
                config.session_secret.expose_secret().as_bytes(),
            ),
            ttl: config.session_ttl,
        }
    }

    /// Issue a session token for `identity` with the given role.
    ///
    /// # Errors
    ///
    /// Returns an error if JWT encoding fails.
    pub fn issue(
        &self,
        identity: &str,
        role: &str,
        groups: Vec<String>,
    ) -> Result<IssuedSession, AuthError> {
        let claims = SessionClaims::new(identity, role, groups, self.ttl);
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        tracing::debug!(sub = %claims.sub, role = %claims.role, jti = %claims.jti, "issued session token");
        Ok(IssuedSession {
            token,
            expires_in: self.ttl.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use secrecy::SecretString;
    use url::Url;

    fn test_config() -> AuthConfig {
        AuthConfig::new(
            Url::parse("https://idp.example.org/realm/verein").unwrap(),
            Url::parse("https://idp.example.org/realm/verein/certs").unwrap(),
            SecretString::from("0123456789abcdef0123456789abcdef"),
            SecretString::from("internal-service-key"),
        )
    }

    #[test]
    fn test_issue_round_trip() {
        let issuer = SessionIssuer::new(&test_config());
        let session = issuer
            .issue("maria@example.org", "vorstand", vec!["vorstand".to_string()])
            .unwrap();
        assert_eq!(session.expires_in, 3600);

        let key = DecodingKey::from_secret(b"0123456789abcdef0123456789abcdef");
        let decoded =
            decode::<SessionClaims>(&session.token, &key, &Validation::new(Algorithm::HS256))
                .unwrap();
        assert_eq!(decoded.claims.sub, "maria@example.org");
        assert_eq!(decoded.claims.role, "vorstand");
        assert_eq!(decoded.claims.groups, vec!["vorstand".to_string()]);
        assert!(decoded.claims.has_session_marker());
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 3600);
    }

    #[test]
    fn test_tokens_carry_unique_ids() {
        let issuer = SessionIssuer::new(&test_config());
        let a = issuer.issue("a@example.org", "member", vec![]).unwrap();
        let b = issuer.issue("a@example.org", "member", vec![]).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_marker_check() {
        let mut claims =
            SessionClaims::new("x@example.org", "member", vec![], Duration::from_secs(60));
        assert!(claims.has_session_marker());
        claims.token_type = "something-else".to_string();
        assert!(!claims.has_session_marker());
    }
}
