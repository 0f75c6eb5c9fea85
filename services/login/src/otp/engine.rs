//! Passcode lifecycle: issue, deliver, verify, mint a session.
//!
//! Verification consumes the stored record atomically before judging it, so
//! concurrent submissions of the same code can never both succeed. A failed
//! attempt re-stores the record with its original deadline; success, expiry
//! and attempt exhaustion leave it consumed.

use crate::mail::OtpMailer;
use crate::members::{normalize_email, valid_email, MemberDirectory, MemberProfile};
use crate::metrics;
use crate::storage::{OtpRecord, OtpStore};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use verein_auth::{AuthError, SessionIssuer};

/// Default passcode lifetime.
const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Default failed attempts allowed per passcode.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A successful verification: the minted session and its member.
#[derive(Debug)]
pub struct VerifiedLogin {
    /// Signed session token.
    pub token: String,
    /// Session lifetime in seconds.
    pub expires_in: u64,
    /// Role derived from the member's committee title.
    pub role: String,
    /// The member's directory profile at verification time.
    pub member: MemberProfile,
}

/// Issues and verifies one-time passcodes.
pub struct OtpEngine {
    store: Arc<dyn OtpStore>,
    directory: Arc<dyn MemberDirectory>,
    mailer: Arc<dyn OtpMailer>,
    sessions: SessionIssuer,
    ttl: Duration,
    max_attempts: u32,
}

impl OtpEngine {
    /// Assemble an engine with default passcode lifetime and attempt budget.
    #[must_use]
    pub fn new(
        store: Arc<dyn OtpStore>,
        directory: Arc<dyn MemberDirectory>,
        mailer: Arc<dyn OtpMailer>,
        sessions: SessionIssuer,
    ) -> Self {
        Self {
            store,
            directory,
            mailer,
            sessions,
            ttl: DEFAULT_TTL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the passcode lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Issue a passcode for an email address and deliver it by mail.
    ///
    /// Any previously outstanding code for the address is overwritten. The
    /// record is stored before delivery is attempted; a delivery failure
    /// reports as an error but leaves the stored code in place. Returns the
    /// window within which the code can be redeemed.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed address, `NotFound` when the directory
    /// has no such member, `Forbidden` when the membership status does not
    /// permit signing in, upstream errors from the directory or mail relay.
    pub async fn request_code(&self, raw_email: &str) -> Result<Duration, AuthError> {
        let email = normalize_email(raw_email);
        if !valid_email(&email) {
            metrics::record_otp_request("invalid_email");
            return Err(AuthError::validation("E-Mail-Adresse ist ungültig"));
        }

        let member = match self.directory.lookup(&email).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                metrics::record_otp_request("unknown_email");
                return Err(AuthError::not_found("E-Mail-Adresse nicht gefunden"));
            }
            Err(err) => {
                metrics::record_otp_request("directory_error");
                return Err(err);
            }
        };
        if !member.is_eligible() {
            metrics::record_otp_request("ineligible");
            return Err(AuthError::forbidden("Mitgliedsstatus erlaubt keinen Zugriff"));
        }

        let record = OtpRecord::new(email.clone(), super::generate_code(), self.ttl);
        self.store.put(&record).await?;
        debug!(email = %email, "passcode stored");

        // Stored first: a failed delivery must not void the code, the
        // member simply requests a new one.
        if let Err(err) = self.mailer.send_code(&member, &record.code, self.ttl).await {
            metrics::record_otp_request("mail_error");
            return Err(err);
        }

        metrics::record_otp_request("issued");
        info!(member_id = member.id, "passcode issued");
        Ok(self.ttl)
    }

    /// Verify a submitted passcode and mint a session for the member.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, `NotFound` when no code is pending,
    /// `Unauthenticated` for an expired or wrong code, `RateLimited` once
    /// the attempt budget is exhausted, `Forbidden` when the membership
    /// lapsed since the code was issued.
    pub async fn verify_code(
        &self,
        raw_email: &str,
        submitted: &str,
    ) -> Result<VerifiedLogin, AuthError> {
        let email = normalize_email(raw_email);
        let submitted = submitted.trim();
        if !valid_email(&email) {
            return Err(AuthError::validation("E-Mail-Adresse ist ungültig"));
        }
        if submitted.is_empty() {
            return Err(AuthError::validation("Code ist erforderlich"));
        }

        let Some(record) = self.store.take(&email).await? else {
            metrics::record_otp_verification("not_found");
            return Err(AuthError::not_found("kein Code angefordert oder Code abgelaufen"));
        };

        // The record's own deadline decides, not the store TTL.
        if record.is_expired() {
            metrics::record_otp_verification("expired");
            return Err(AuthError::unauthenticated("Code ist abgelaufen"));
        }

        if record.attempts >= self.max_attempts {
            metrics::record_otp_verification("too_many_attempts");
            warn!(attempts = record.attempts, "passcode attempt budget exhausted");
            return Err(AuthError::rate_limited("zu viele Fehlversuche"));
        }

        if !codes_match(submitted, &record.code) {
            let mut failed = record;
            failed.attempts += 1;
            // Re-store with the original deadline so retries never extend
            // the code's life.
            self.store.put(&failed).await?;
            metrics::record_otp_verification("invalid_code");
            return Err(AuthError::unauthenticated("ungültiger Code"));
        }

        // Code consumed. Re-resolve the member so role and summary reflect
        // the directory now, not at issuance time.
        let member = self
            .directory
            .lookup(&email)
            .await?
            .ok_or_else(|| AuthError::not_found("E-Mail-Adresse nicht gefunden"))?;
        if !member.is_eligible() {
            metrics::record_otp_verification("ineligible");
            return Err(AuthError::forbidden("Mitgliedsstatus erlaubt keinen Zugriff"));
        }

        let role = member.role();
        let session = self.sessions.issue(&email, role, vec![role.to_string()])?;

        metrics::record_otp_verification("success");
        metrics::record_session_issued(role);
        info!(member_id = member.id, role = role, "login verified");

        Ok(VerifiedLogin {
            token: session.token,
            expires_in: session.expires_in,
            role: role.to_string(),
            member,
        })
    }
}

/// Constant-time passcode comparison.
fn codes_match(submitted: &str, expected: &str) -> bool {
    bool::from(submitted.as_bytes().ct_eq(expected.as_bytes()))
}
