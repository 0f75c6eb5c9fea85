//! Token verification across the three trust sources.
//!
//! A credential is checked against an explicit, ordered list of strategies:
//! internal shared-secret header, then symmetric session token, then
//! asymmetric provider token. Each strategy yields a tri-state outcome; the
//! chain stops at the first acceptance and only reports `Unauthenticated`
//! once every strategy has declined or rejected. Verification paths are
//! bound to their signature scheme — the session path only ever attempts
//! HS256, the provider path only RS256/ES256 — so a token can never be
//! validated under a scheme other than the one its source uses.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::keyset::KeySetCache;
use crate::principal::{Principal, TrustSource, ROLE_MEMBER};
use crate::session::SESSION_TOKEN_TYPE;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Credentials extracted from an incoming request.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Value of the `X-API-Key` header, if present.
    pub api_key: Option<String>,
    /// Bearer token from the `Authorization` header, if present.
    pub bearer: Option<String>,
}

impl Credentials {
    /// Credentials carrying only a bearer token.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            api_key: None,
            bearer: Some(token.into()),
        }
    }

    /// Credentials carrying only an internal API key.
    #[must_use]
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            bearer: None,
        }
    }

    /// Whether no credential material is present at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.bearer.is_none()
    }
}

/// Outcome of a single verification strategy.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// The strategy verified the credential and produced a principal.
    Accepted(Principal),
    /// The credential is not of this strategy's kind; try the next one.
    NotApplicable,
    /// The credential is of this kind but failed verification. The chain
    /// still continues; the error only shapes the final failure.
    Rejected(AuthError),
}

/// The verification strategies, in their fixed precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Internal shared-secret header.
    SharedSecret,
    /// Symmetric internal session token.
    Session,
    /// Asymmetric identity-provider token.
    Provider,
}

impl Strategy {
    /// Stable name for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SharedSecret => "shared-secret",
            Self::Session => "session",
            Self::Provider => "provider",
        }
    }
}

/// Cheapest first; ordering is security-relevant and must not change.
const CHAIN: [Strategy; 3] = [Strategy::SharedSecret, Strategy::Session, Strategy::Provider];

/// Lenient claim view for the session path.
///
/// Only the marker decides whether a structurally valid HS256 token belongs
/// to this source, so everything except the marker is optional here.
#[derive(Debug, Deserialize)]
struct RawSessionClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(rename = "type", default)]
    token_type: String,
}

/// Claims extracted from a provider-issued token.
#[derive(Debug, Deserialize)]
struct ProviderClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
}

/// Verifies bearer credentials against the three trust sources.
pub struct TokenVerifier {
    internal_api_key: SecretString,
    session_key: DecodingKey,
    provider_issuer: String,
    keys: Arc<KeySetCache>,
}

impl TokenVerifier {
    /// Create a verifier from the shared configuration and key-set cache.
    #[must_use]
    pub fn new(config: &AuthConfig, keys: Arc<KeySetCache>) -> Self {
        Self {
            internal_api_key: config.internal_api_key.clone(),
            session_key: DecodingKey::from_secret(
                config.session_secret.expose_secret().as_bytes(),
            ),
            provider_issuer: config.provider_issuer.to_string(),
            keys,
        }
    }

    /// Verify a credential and derive its principal.
    ///
    /// # Errors
    ///
    /// [`AuthError::Unauthenticated`] when no strategy accepts the
    /// credential; an upstream error when verification was impossible
    /// because the key-set endpoint failed (never masked as a credential
    /// judgment).
    pub async fn verify(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        if credentials.is_empty() {
            return Err(AuthError::unauthenticated("authentication required"));
        }

        let mut last_rejection: Option<AuthError> = None;

        for strategy in CHAIN {
            match self.try_strategy(strategy, credentials).await {
                VerifyOutcome::Accepted(principal) => {
                    debug!(strategy = strategy.as_str(), id = %principal.id, "credential accepted");
                    return Ok(principal);
                }
                VerifyOutcome::NotApplicable => {}
                VerifyOutcome::Rejected(err) => {
                    warn!(strategy = strategy.as_str(), error = %err, "credential rejected");
                    last_rejection = Some(err);
                }
            }
        }

        match last_rejection {
            // An upstream outage is reported as such, not as a bad credential.
            Some(err) if err.is_retryable() => Err(err),
            _ => Err(AuthError::unauthenticated("authentication failed")),
        }
    }

    /// Run a single strategy against the credential.
    pub async fn try_strategy(
        &self,
        strategy: Strategy,
        credentials: &Credentials,
    ) -> VerifyOutcome {
        match strategy {
            Strategy::SharedSecret => self.try_shared_secret(credentials),
            Strategy::Session => self.try_session(credentials),
            Strategy::Provider => self.try_provider(credentials).await,
        }
    }

    fn try_shared_secret(&self, credentials: &Credentials) -> VerifyOutcome {
        let Some(presented) = credentials.api_key.as_deref() else {
            return VerifyOutcome::NotApplicable;
        };

        let expected = self.internal_api_key.expose_secret().as_bytes();
        if bool::from(presented.as_bytes().ct_eq(expected)) {
            VerifyOutcome::Accepted(Principal::internal_service())
        } else {
            VerifyOutcome::Rejected(AuthError::unauthenticated("invalid api key"))
        }
    }

    fn try_session(&self, credentials: &Credentials) -> VerifyOutcome {
        let Some(token) = credentials.bearer.as_deref() else {
            return VerifyOutcome::NotApplicable;
        };

        let header = match decode_header(token) {
            Ok(header) => header,
            Err(_) => {
                return VerifyOutcome::Rejected(AuthError::unauthenticated("malformed token"))
            }
        };

        // Algorithm-to-source binding: this path never attempts anything
        // but the symmetric scheme.
        if header.alg != Algorithm::HS256 {
            return VerifyOutcome::NotApplicable;
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        match decode::<RawSessionClaims>(token, &self.session_key, &validation) {
            Ok(data) => {
                if data.claims.token_type != SESSION_TOKEN_TYPE {
                    // Valid HS256, wrong or missing marker: not this source.
                    return VerifyOutcome::NotApplicable;
                }
                let Some(sub) = data.claims.sub else {
                    return VerifyOutcome::Rejected(AuthError::unauthenticated(
                        "session token missing subject",
                    ));
                };
                let role = data
                    .claims
                    .role
                    .unwrap_or_else(|| ROLE_MEMBER.to_string());
                let groups = if data.claims.groups.is_empty() {
                    vec![role]
                } else {
                    data.claims.groups
                };
                VerifyOutcome::Accepted(Principal {
                    id: sub.clone(),
                    email: Some(sub.clone()),
                    name: sub,
                    groups,
                    source: TrustSource::Session,
                })
            }
            Err(err) => match err.kind() {
                // Soft failure: a foreign HS256 token falls through.
                jsonwebtoken::errors::ErrorKind::InvalidSignature => VerifyOutcome::NotApplicable,
                _ => VerifyOutcome::Rejected(err.into()),
            },
        }
    }

    async fn try_provider(&self, credentials: &Credentials) -> VerifyOutcome {
        let Some(token) = credentials.bearer.as_deref() else {
            return VerifyOutcome::NotApplicable;
        };

        let header = match decode_header(token) {
            Ok(header) => header,
            Err(_) => {
                return VerifyOutcome::Rejected(AuthError::unauthenticated("malformed token"))
            }
        };

        // The symmetric scheme is categorically rejected on this path.
        if !matches!(header.alg, Algorithm::RS256 | Algorithm::ES256) {
            return VerifyOutcome::NotApplicable;
        }

        // Provider tokens always name their key.
        let Some(kid) = header.kid else {
            return VerifyOutcome::NotApplicable;
        };

        let key = match self.keys.get_key(&kid).await {
            Ok(key) => key,
            Err(err) => return VerifyOutcome::Rejected(err),
        };

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.provider_issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;

        match decode::<ProviderClaims>(token, &key, &validation) {
            Ok(data) => {
                let claims = data.claims;
                let name = claims
                    .name
                    .or(claims.preferred_username)
                    .or_else(|| claims.email.clone())
                    .unwrap_or_else(|| claims.sub.clone());
                VerifyOutcome::Accepted(Principal {
                    id: claims.sub,
                    email: claims.email,
                    name,
                    groups: claims.groups,
                    source: TrustSource::Provider,
                })
            }
            Err(err) => VerifyOutcome::Rejected(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionClaims, SessionIssuer};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use url::Url;

    const SESSION_SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn test_config() -> AuthConfig {
        AuthConfig::new(
            Url::parse("https://idp.example.org/realm/verein").unwrap(),
            Url::parse("https://idp.example.org/realm/verein/certs").unwrap(),
            SecretString::from(SESSION_SECRET),
            SecretString::from("internal-service-key"),
        )
    }

    fn test_verifier() -> TokenVerifier {
        let config = test_config();
        let keys = Arc::new(KeySetCache::new(&config).unwrap());
        TokenVerifier::new(&config, keys)
    }

    #[tokio::test]
    async fn test_no_credentials_is_unauthenticated() {
        let verifier = test_verifier();
        let err = verifier.verify(&Credentials::default()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_shared_secret_accepts_and_short_circuits() {
        let verifier = test_verifier();
        let principal = verifier
            .verify(&Credentials::api_key("internal-service-key"))
            .await
            .unwrap();
        assert_eq!(principal.source, TrustSource::SharedSecret);
        assert!(principal.has_any_role(&["vorstand"]));
    }

    #[tokio::test]
    async fn test_wrong_api_key_is_unauthenticated() {
        let verifier = test_verifier();
        let err = verifier
            .verify(&Credentials::api_key("not-the-key"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_session_token_round_trip() {
        let config = test_config();
        let issuer = SessionIssuer::new(&config);
        let session = issuer
            .issue("maria@example.org", "vorstand", vec!["vorstand".to_string()])
            .unwrap();

        let verifier = test_verifier();
        let principal = verifier
            .verify(&Credentials::bearer(session.token))
            .await
            .unwrap();
        assert_eq!(principal.source, TrustSource::Session);
        assert_eq!(principal.id, "maria@example.org");
        assert_eq!(principal.groups, vec!["vorstand".to_string()]);
    }

    #[tokio::test]
    async fn test_hs256_without_marker_falls_through() {
        // Same secret, no `type` claim at all.
        let claims = serde_json::json!({
            "sub": "maria@example.org",
            "exp": chrono::Utc::now().timestamp() + 300,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SESSION_SECRET.as_bytes()),
        )
        .unwrap();

        let verifier = test_verifier();
        let err = verifier
            .verify(&Credentials::bearer(token))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_hs256_with_wrong_marker_falls_through() {
        let mut claims = SessionClaims::new(
            "maria@example.org",
            "member",
            vec![],
            std::time::Duration::from_secs(300),
        );
        claims.token_type = "refresh".to_string();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SESSION_SECRET.as_bytes()),
        )
        .unwrap();

        let verifier = test_verifier();
        let err = verifier
            .verify(&Credentials::bearer(token))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_foreign_symmetric_signature_is_unauthenticated() {
        let claims = SessionClaims::new(
            "maria@example.org",
            "member",
            vec![],
            std::time::Duration::from_secs(300),
        );
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"a-completely-different-secret!!"),
        )
        .unwrap();

        let verifier = test_verifier();
        let err = verifier
            .verify(&Credentials::bearer(token))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthenticated() {
        let mut claims = SessionClaims::new(
            "maria@example.org",
            "member",
            vec![],
            std::time::Duration::from_secs(3600),
        );
        claims.iat -= 7200;
        claims.exp -= 7200;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SESSION_SECRET.as_bytes()),
        )
        .unwrap();

        let verifier = test_verifier();
        let err = verifier
            .verify(&Credentials::bearer(token))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_garbage_bearer_is_unauthenticated() {
        let verifier = test_verifier();
        let err = verifier
            .verify(&Credentials::bearer("not-a-jwt"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_api_key_takes_precedence_over_bearer() {
        let verifier = test_verifier();
        let credentials = Credentials {
            api_key: Some("internal-service-key".to_string()),
            bearer: Some("garbage".to_string()),
        };
        let principal = verifier.verify(&credentials).await.unwrap();
        assert_eq!(principal.source, TrustSource::SharedSecret);
    }
}
