//! In-process OTP storage for tests and local development.

use super::{OtpRecord, OtpStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use verein_auth::AuthError;

/// Plain map store guarded by a mutex. Expiry is enforced by the engine
/// through the record's own deadline; this store never evicts.
#[derive(Debug, Default)]
pub struct MemoryOtpStore {
    records: Mutex<HashMap<String, OtpRecord>>,
}

impl MemoryOtpStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no records are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn put(&self, record: &OtpRecord) -> Result<(), AuthError> {
        self.records
            .lock()
            .insert(record.email.clone(), record.clone());
        Ok(())
    }

    async fn take(&self, email: &str) -> Result<Option<OtpRecord>, AuthError> {
        Ok(self.records.lock().remove(email))
    }
}
