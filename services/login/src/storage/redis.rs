//! Redis-backed OTP storage.
//!
//! Atomic consume maps to `GETDEL`; the store TTL mirrors the record's
//! deadline so abandoned codes disappear on their own.

use super::{OtpRecord, OtpStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::RwLock;
use verein_auth::AuthError;

/// OTP store on a shared Redis connection.
pub struct RedisOtpStore {
    conn: Arc<RwLock<ConnectionManager>>,
}

impl std::fmt::Debug for RedisOtpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisOtpStore").finish_non_exhaustive()
    }
}

impl RedisOtpStore {
    /// Connect to Redis and build a managed connection.
    ///
    /// # Errors
    ///
    /// Configuration error for an unparseable URL, upstream error when the
    /// initial connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, AuthError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AuthError::config(format!("invalid redis url: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(store_error)?;

        Ok(Self {
            conn: Arc::new(RwLock::new(conn)),
        })
    }

    fn key(email: &str) -> String {
        format!("otp:{email}")
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, record: &OtpRecord) -> Result<(), AuthError> {
        let value = serde_json::to_string(record)
            .map_err(|e| AuthError::internal(format!("otp record encode: {e}")))?;
        let ttl = record.remaining_ttl().as_secs();

        let mut conn = self.conn.write().await;
        conn.set_ex::<_, _, ()>(Self::key(&record.email), value, ttl)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn take(&self, email: &str) -> Result<Option<OtpRecord>, AuthError> {
        let mut conn = self.conn.write().await;
        let value: Option<String> = conn
            .get_del(Self::key(email))
            .await
            .map_err(store_error)?;
        drop(conn);

        match value {
            Some(raw) => {
                let record = serde_json::from_str(&raw)
                    .map_err(|e| AuthError::internal(format!("otp record decode: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// Redis failures are an upstream-dependency problem for callers.
fn store_error(err: redis::RedisError) -> AuthError {
    AuthError::upstream(format!("otp store: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespacing() {
        assert_eq!(RedisOtpStore::key("maria@example.org"), "otp:maria@example.org");
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let err = RedisOtpStore::connect("not a url").await.unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }
}
