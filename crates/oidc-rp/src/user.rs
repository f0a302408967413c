//! The signed-in user and the session holding their tokens.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::jose::{ClaimError, Claims};

/// Claim keys read by the convenience accessors.
pub mod claim_names {
    /// Subject identifier.
    pub const SUB: &str = "sub";
    /// Display name.
    pub const NAME: &str = "name";
    /// Email address.
    pub const EMAIL: &str = "email";
    /// Roles.
    pub const ROLE: &str = "role";
}

/// A user profile built from identity token and userinfo claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OidcUser {
    /// Profile claims.
    pub claims: Claims,
    /// Issuer that authenticated the user.
    pub issuer: String,
    /// Claim holding the display name.
    pub name_claim_key: String,
    /// Claim holding the roles.
    pub role_claim_key: String,
}

impl OidcUser {
    /// Creates a user. Empty claim keys fall back to `name` and `role`.
    #[must_use]
    pub fn new(
        claims: Claims,
        issuer: impl Into<String>,
        name_claim_key: &str,
        role_claim_key: &str,
    ) -> Self {
        let or_default = |key: &str, default: &str| {
            if key.is_empty() {
                default.to_string()
            } else {
                key.to_string()
            }
        };
        Self {
            claims,
            issuer: issuer.into(),
            name_claim_key: or_default(name_claim_key, claim_names::NAME),
            role_claim_key: or_default(role_claim_key, claim_names::ROLE),
        }
    }

    /// The `sub` claim.
    pub fn sub(&self) -> Result<Option<&str>, ClaimError> {
        self.claims.string(claim_names::SUB)
    }

    /// The display name from the configured name claim.
    pub fn name(&self) -> Result<Option<&str>, ClaimError> {
        self.claims.string(&self.name_claim_key)
    }

    /// The `email` claim.
    pub fn email(&self) -> Result<Option<&str>, ClaimError> {
        self.claims.string(claim_names::EMAIL)
    }

    /// Roles from the configured role claim, a string or an array on the wire.
    pub fn roles(&self) -> Result<Vec<String>, ClaimError> {
        Ok(self
            .claims
            .strings(&self.role_claim_key)?
            .unwrap_or_default())
    }
}

/// Tokens and profile of an authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    /// Access token, if the flow returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Raw identity token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Access token type, usually `Bearer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Provider session state for session monitoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,

    /// Access token expiry.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,

    /// The `state` value of the response that created this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Data stored with the authentication request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_data: BTreeMap<String, String>,

    /// The user profile.
    pub user: OidcUser,
}

impl UserSession {
    /// Returns `true` once the access token expiry has passed.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Time left before expiry, `None` without an expiry or once expired.
    #[must_use]
    pub fn expires_in(&self, now: OffsetDateTime) -> Option<Duration> {
        self.expires_at
            .and_then(|expires_at| Duration::try_from(expires_at - now).ok())
            .filter(|left| !left.is_zero())
    }

    /// Returns `true` if `scope` was granted.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}
