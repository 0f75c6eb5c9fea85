//! Login Service library.
//!
//! Provides OTP issuance and verification for the member portal, session
//! token minting, and the authenticated introspection surface. All token
//! verification goes through the shared `verein-auth` chain.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod mail;
pub mod members;
pub mod metrics;
pub mod otp;
pub mod storage;

// Re-exports for convenience
pub use api::AppState;
pub use config::Config;
pub use otp::OtpEngine;
