//! Centralized configuration for the Login Service.
//!
//! All configuration is loaded from environment variables and validated
//! at startup. The shared authentication configuration is included.

use std::env;
use std::time::Duration;
use url::Url;
use verein_auth::{AuthConfig, AuthError};

/// Login Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    // OTP settings
    /// Lifetime of an issued passcode
    pub otp_ttl: Duration,
    /// Failed attempts allowed before a passcode is voided
    pub otp_max_attempts: u32,

    // Collaborators
    /// Redis connection URL; in-process storage is used when unset
    pub redis_url: Option<String>,
    /// Base URL of the member-administration API
    pub member_directory_url: Url,
    /// Base URL of the mail relay
    pub mailer_url: Url,

    // Shared authentication settings
    /// Verifier, key-set and session configuration
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_env("PORT", 8080)?;

        let otp_ttl = Duration::from_secs(parse_env("OTP_TTL_SECS", 600)?);
        let otp_max_attempts = parse_env("OTP_MAX_ATTEMPTS", 3)?;

        let redis_url = env::var("REDIS_URL").ok();
        let member_directory_url = parse_url_env("MEMBER_DIRECTORY_URL")?;
        let mailer_url = parse_url_env("MAILER_URL")?;

        let auth = AuthConfig::from_env()?;

        let config = Self {
            host,
            port,
            otp_ttl,
            otp_max_attempts,
            redis_url,
            member_directory_url,
            mailer_url,
            auth,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that `from_env` parsing alone cannot catch.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for zero TTLs or attempt budgets.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.otp_ttl.is_zero() {
            return Err(AuthError::config("OTP_TTL_SECS must be positive"));
        }
        if self.otp_max_attempts == 0 {
            return Err(AuthError::config("OTP_MAX_ATTEMPTS must be positive"));
        }
        Ok(())
    }

    /// Socket address string for the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse environment variable with default value.
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
