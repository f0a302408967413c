//! PKCE (Proof Key for Code Exchange) for the authorization code flow.
//!
//! Implements the client side of RFC 7636 with the S256 method only.
//! The verifier is 96 random bytes encoded as base64url (128 characters),
//! the upper bound RFC 7636 allows.
//!
//! # Example
//!
//! ```
//! use oidc_rp::crypto::PkcePair;
//!
//! let pair = PkcePair::generate();
//! assert_eq!(pair.verifier.as_str().len(), 128);
//! assert_eq!(pair.challenge.as_str().len(), 43);
//! ```

use super::{base64url_encode, random_bytes, sha256};

/// Number of random bytes behind a generated verifier.
pub const VERIFIER_BYTES: usize = 96;

// =============================================================================
// PKCE Challenge Method
// =============================================================================

/// PKCE challenge method. Only S256 is ever sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PkceChallengeMethod {
    /// SHA-256 hash.
    #[default]
    S256,
}

impl PkceChallengeMethod {
    /// Get the method as it appears in `code_challenge_method`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PKCE Verifier
// =============================================================================

/// PKCE code verifier.
///
/// Kept in the pending request state until the token request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Generate a verifier from 96 random bytes.
    #[must_use]
    pub fn generate() -> Self {
        Self(base64url_encode(random_bytes(VERIFIER_BYTES)))
    }

    /// Get the verifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// PKCE Challenge
// =============================================================================

/// PKCE code challenge: `BASE64URL(SHA256(ASCII(code_verifier)))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Derive the S256 challenge for a verifier.
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        Self(base64url_encode(sha256(verifier.as_str().as_bytes())))
    }

    /// Get the challenge as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A verifier together with its derived challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// Sent to the token endpoint.
    pub verifier: PkceVerifier,
    /// Sent to the authorization endpoint.
    pub challenge: PkceChallenge,
    /// Always S256.
    pub method: PkceChallengeMethod,
}

impl PkcePair {
    /// Generate a fresh pair.
    #[must_use]
    pub fn generate() -> Self {
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_verifier(&verifier);
        Self {
            verifier,
            challenge,
            method: PkceChallengeMethod::S256,
        }
    }
}
