//! Shared authentication and authorization core for the Verein platform.
//!
//! This crate provides centralized implementations for:
//! - Error types with HTTP status mapping and retryability classification
//! - Runtime configuration with environment loading and validation
//! - Principals and group-based role resolution
//! - The identity-provider key-set cache (TTL, rate limit, singleflight)
//! - Token verification across shared-secret, session and provider sources
//! - Internal session token issuance
//! - Axum header extraction and error responses

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod keyset;
pub mod principal;
pub mod session;
pub mod verifier;
pub mod web;

pub use config::AuthConfig;
pub use error::AuthError;
pub use keyset::KeySetCache;
pub use principal::{Principal, TrustSource, ROLE_MEMBER, ROLE_VORSTAND, SUPERSET_ROLE};
pub use session::{IssuedSession, SessionClaims, SessionIssuer, SESSION_TOKEN_TYPE};
pub use verifier::{Credentials, Strategy, TokenVerifier, VerifyOutcome};
