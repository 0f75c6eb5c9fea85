//! Normalized principal and role checks.
//!
//! Whatever trust source a credential came from, verification produces the
//! same [`Principal`] shape, and authorization is a single set-intersection
//! check over its groups.

use crate::error::AuthError;
use serde::{Deserialize, Serialize};

/// Role that satisfies every role check.
pub const SUPERSET_ROLE: &str = "admin";

/// Role granted to members holding a designated committee title.
pub const ROLE_VORSTAND: &str = "vorstand";

/// Base role of any active member.
pub const ROLE_MEMBER: &str = "member";

/// Trust source a principal was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustSource {
    /// Internal shared-secret header.
    SharedSecret,
    /// Symmetric internal session token.
    Session,
    /// Asymmetric identity-provider token.
    Provider,
}

impl TrustSource {
    /// Stable name for log and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SharedSecret => "shared-secret",
            Self::Session => "session",
            Self::Provider => "provider",
        }
    }
}

/// Normalized view of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier (subject id or email).
    pub id: String,
    /// Email address, when the credential carried one.
    pub email: Option<String>,
    /// Display name.
    pub name: String,
    /// Group/role memberships.
    pub groups: Vec<String>,
    /// Which trust source verified the credential.
    pub source: TrustSource,
}

impl Principal {
    /// The fixed principal for the internal shared-secret path.
    ///
    /// Carries the superset role, so it passes every role check.
    #[must_use]
    pub fn internal_service() -> Self {
        Self {
            id: "api".to_string(),
            email: None,
            name: "API Service".to_string(),
            groups: vec![SUPERSET_ROLE.to_string()],
            source: TrustSource::SharedSecret,
        }
    }

    /// Whether this principal holds any of the given roles.
    ///
    /// True when the group set intersects `roles`, or when the principal
    /// carries [`SUPERSET_ROLE`].
    #[must_use]
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        self.groups.iter().any(|g| {
            g == SUPERSET_ROLE || roles.iter().any(|r| r == g)
        })
    }

    /// Enforce that this principal holds any of the given roles.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when the check fails. The caller is
    /// authenticated at this point, so this is never an `Unauthenticated`.
    pub fn require_any_role(&self, roles: &[&str]) -> Result<(), AuthError> {
        if self.has_any_role(roles) {
            Ok(())
        } else {
            Err(AuthError::forbidden("insufficient permissions"))
        }
    }
}
