//! Member directory lookups and role derivation.
//!
//! The directory is the member-administration API. Eligibility and role are
//! decided here, from the profile's membership status and committee title,
//! so the rest of the service only ever sees `vorstand`/`member`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use verein_auth::{AuthError, ROLE_MEMBER, ROLE_VORSTAND};

/// Membership statuses that may sign in.
const ELIGIBLE_STATUSES: &[&str] = &["Aktivmitglied", "Ehrenmitglied"];

/// Committee titles that carry the board role, lowercased for matching.
const BOARD_TITLES: &[&str] = &[
    "vorstand",
    "präsident",
    "kassier",
    "aktuar",
    "materialwart",
    "revisor",
];

/// A member as the directory reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    /// Directory record id.
    pub id: u64,
    /// First name.
    pub vorname: String,
    /// Family name.
    pub nachname: String,
    /// Contact email.
    pub email: String,
    /// Membership status, e.g. `Aktivmitglied`.
    pub status: String,
    /// Committee title, if the member holds one.
    #[serde(default)]
    pub funktion: Option<String>,
}

impl MemberProfile {
    /// Display name, first name first.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.vorname, self.nachname)
    }

    /// Whether the membership status permits signing in.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        ELIGIBLE_STATUSES.contains(&self.status.as_str())
    }

    /// Whether the committee title carries board rights.
    ///
    /// Case-insensitive substring match, so combined titles such as
    /// "Kassier, Aktuar" qualify too.
    #[must_use]
    pub fn is_board_member(&self) -> bool {
        self.funktion.as_deref().is_some_and(|funktion| {
            let funktion = funktion.to_lowercase();
            BOARD_TITLES.iter().any(|title| funktion.contains(title))
        })
    }

    /// Role granted to this member's sessions.
    #[must_use]
    pub fn role(&self) -> &'static str {
        if self.is_board_member() {
            ROLE_VORSTAND
        } else {
            ROLE_MEMBER
        }
    }
}

/// Canonical form of an email for store keys and directory lookups.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Minimal shape check before any store or directory call.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}

/// Source of member profiles.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Look up a member by normalized email.
    ///
    /// `Ok(None)` means the address is not in the directory; failures to
    /// reach the directory are errors, never `None`.
    async fn lookup(&self, email: &str) -> Result<Option<MemberProfile>, AuthError>;
}

/// Directory client against the member-administration API.
pub struct HttpMemberDirectory {
    base_url: Url,
    api_key: SecretString,
    http: reqwest::Client,
}

impl HttpMemberDirectory {
    /// Build a client with bounded timeouts.
    ///
    /// # Errors
    ///
    /// Configuration error when the HTTP client cannot be constructed.
    pub fn new(base_url: Url, api_key: SecretString) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AuthError::config(format!("member directory client: {e}")))?;

        Ok(Self {
            base_url,
            api_key,
            http,
        })
    }
}

#[async_trait]
impl MemberDirectory for HttpMemberDirectory {
    async fn lookup(&self, email: &str) -> Result<Option<MemberProfile>, AuthError> {
        let url = self
            .base_url
            .join("members/by-email")
            .map_err(|e| AuthError::config(format!("member directory url: {e}")))?;

        let response = self
            .http
            .get(url)
            .query(&[("email", email)])
            .header("x-api-key", self.api_key.expose_secret())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AuthError::upstream(format!(
                "member directory returned {}",
                response.status()
            )));
        }

        let profile = response.json::<MemberProfile>().await?;
        Ok(Some(profile))
    }
}
