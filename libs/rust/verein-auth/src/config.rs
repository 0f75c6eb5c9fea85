//! Configuration for the shared authentication core.
//!
//! All values are read from the environment once at startup and validated
//! before any component is constructed. Components receive the config by
//! value; nothing reads the environment per request.

use crate::error::AuthError;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::time::Duration;
use url::Url;

/// Configuration for the token verifier, key-set cache, and session issuer.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Expected `iss` claim of provider-issued tokens.
    pub provider_issuer: Url,
    /// Provider's published key-set endpoint.
    pub jwks_url: Url,
    /// Symmetric secret for internal session tokens.
    pub session_secret: SecretString,
    /// Shared secret accepted via the `X-API-Key` header.
    pub internal_api_key: SecretString,
    /// Lifetime of issued session tokens.
    pub session_ttl: Duration,
    /// Freshness window for cached provider keys.
    pub keys_ttl: Duration,
    /// Upper bound on key-set fetches per minute.
    pub keys_refresh_per_minute: u32,
    /// Deadline for a single key-set fetch.
    pub fetch_timeout: Duration,
}

impl AuthConfig {
    /// Create a config with the required secrets and endpoints; remaining
    /// fields take their production defaults.
    #[must_use]
    pub fn new(
        provider_issuer: Url,
        jwks_url: Url,
        session_secret: SecretString,
        internal_api_key: SecretString,
    ) -> Self {
        Self {
            provider_issuer,
            jwks_url,
            session_secret,
            internal_api_key,
            session_ttl: Duration::from_secs(3600),
            keys_ttl: Duration::from_secs(600),
            keys_refresh_per_minute: 10,
            fetch_timeout: Duration::from_secs(10),
        }
    }

    /// Override the session token lifetime.
    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Override the key-set freshness window.
    #[must_use]
    pub const fn with_keys_ttl(mut self, ttl: Duration) -> Self {
        self.keys_ttl = ttl;
        self
    }

    /// Override the key-set refresh budget.
    #[must_use]
    pub const fn with_keys_refresh_per_minute(mut self, per_minute: u32) -> Self {
        self.keys_refresh_per_minute = per_minute;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or malformed.
    pub fn from_env() -> Result<Self, AuthError> {
        dotenvy::dotenv().ok();

        let provider_issuer = parse_url_env("AUTH_PROVIDER_ISSUER")?;
        let jwks_url = parse_url_env("AUTH_JWKS_URL")?;
        let session_secret = parse_secret_env("SESSION_SECRET")?;
        let internal_api_key = parse_secret_env("INTERNAL_API_KEY")?;

        let config = Self::new(provider_issuer, jwks_url, session_secret, internal_api_key)
            .with_session_ttl(Duration::from_secs(parse_env("SESSION_TTL_SECS", 3600)?))
            .with_keys_ttl(Duration::from_secs(parse_env("KEYS_TTL_SECS", 600)?))
            .with_keys_refresh_per_minute(parse_env("KEYS_REFRESH_PER_MINUTE", 10)?);

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, failing fast on unusable values.
    ///
    /// # Errors
    ///
    /// Returns a [`AuthError::Config`] describing the first violation found.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.session_secret.expose_secret().len() < 16 {
            return Err(AuthError::config(
                "SESSION_SECRET must be at least 16 bytes",
            ));
        }
        if self.internal_api_key.expose_secret().is_empty() {
            return Err(AuthError::config("INTERNAL_API_KEY must not be empty"));
        }
        if self.session_ttl.as_secs() == 0 {
            return Err(AuthError::config("SESSION_TTL_SECS must be positive"));
        }
        if self.keys_ttl.as_secs() == 0 {
            return Err(AuthError::config("KEYS_TTL_SECS must be positive"));
        }
        if self.keys_refresh_per_minute == 0 {
            return Err(AuthError::config("KEYS_REFRESH_PER_MINUTE must be positive"));
        }
        Ok(())
    }

    /// Minimum spacing between upstream key-set fetches that keeps the
    /// refresh cadence within budget.
    #[must_use]
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(60) / self.keys_refresh_per_minute.max(1)
    }
}

/// Parse an environment variable with a default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AuthError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| AuthError::config(format!("invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse a required URL environment variable.
fn parse_url_env(name: &str) -> Result<Url, AuthError> {
    let raw = env::var(name).map_err(|_| AuthError::config(format!("{name} is required")))?;
    Url::parse(&raw).map_err(|e| AuthError::config(format!("invalid {name}: {e}")))
}

/// Parse a required, non-empty secret environment variable.
fn parse_secret_env(name: &str) -> Result<SecretString, AuthError> {
    let raw = env::var(name).map_err(|_| AuthError::config(format!("{name} is required")))?;
    if raw.is_empty() {
        return Err(AuthError::config(format!("{name} must not be empty")));
    }
    Ok(SecretString::from(raw))
}
