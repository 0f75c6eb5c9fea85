//! OTP record storage.
//!
//! Verification uses take-semantics: a record leaves the store the moment it
//! is read, so two racing submissions can never both see the same code. The
//! engine re-stores the record itself when an attempt failed but the code is
//! still live.

pub mod memory;
pub mod redis;

pub use memory::MemoryOtpStore;
pub use redis::RedisOtpStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use verein_auth::AuthError;

/// A stored one-time passcode and its verification state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    /// Normalized email the code was issued for.
    pub email: String,
    /// The six-digit passcode.
    pub code: String,
    /// Failed verification attempts so far.
    pub attempts: u32,
    /// Unix timestamp after which the code is dead regardless of store TTL.
    pub expires_at: i64,
}

impl OtpRecord {
    /// Create a fresh record for a normalized email.
    #[must_use]
    pub fn new(email: impl Into<String>, code: impl Into<String>, ttl: Duration) -> Self {
        let lifetime = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            email: email.into(),
            code: code.into(),
            attempts: 0,
            expires_at: chrono::Utc::now().timestamp().saturating_add(lifetime),
        }
    }

    /// Whether the authoritative deadline has passed.
    ///
    /// Store TTLs are advisory; this timestamp decides.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expires_at
    }

    /// Time left until the deadline, floored at one second so that a
    /// re-stored record never gets an instantly-vanishing TTL.
    #[must_use]
    pub fn remaining_ttl(&self) -> Duration {
        let left = self.expires_at - chrono::Utc::now().timestamp();
        Duration::from_secs(u64::try_from(left).unwrap_or(0).max(1))
    }
}

/// Storage backend for outstanding passcodes.
///
/// One record per email: `put` overwrites any previous code for the same
/// address, `take` atomically removes and returns the current one.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store a record under its email, replacing an existing one.
    async fn put(&self, record: &OtpRecord) -> Result<(), AuthError>;

    /// Atomically remove and return the record for an email.
    async fn take(&self, email: &str) -> Result<Option<OtpRecord>, AuthError>;
}
