//! Token validation errors.

use std::fmt;

use super::algorithm::KeyType;
use super::claims::ClaimError;

/// The validation stage a [`TokenError`] was raised in.
///
/// Stages run in this order and the first failure aborts validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationStage {
    /// Size, shape and encoding of the compact serialization.
    Format,
    /// The JOSE header.
    Header,
    /// The JWS signature.
    Signature,
    /// The registered claims.
    Payload,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Format => "format",
            Self::Header => "header",
            Self::Signature => "signature",
            Self::Payload => "payload",
        };
        f.write_str(name)
    }
}

/// Reasons an identity token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token is empty.
    #[error("The token is empty")]
    Empty,

    /// The token exceeds the configured size.
    #[error("The token is {size} bytes, more than the maximum of {max}")]
    TooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The token is not a three-part base64url compact serialization.
    #[error("The token is not a valid compact JWS")]
    Malformed,

    /// A part could not be decoded.
    #[error("Invalid {part} encoding: {detail}")]
    InvalidEncoding {
        /// Which part failed.
        part: &'static str,
        /// Decoder message.
        detail: String,
    },

    /// A signed token without a signature part.
    #[error("The token has no signature")]
    MissingSignature,

    /// An unsecured token that carries a signature part.
    #[error("An unsecured token must not carry a signature")]
    UnexpectedSignature,

    /// The header has no `alg`.
    #[error("The token header does not contain an algorithm")]
    MissingAlgorithm,

    /// The header `alg` is not a registered JWS algorithm.
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// The `crit` header is present.
    #[error("The crit header parameter is not supported")]
    CriticalHeader,

    /// The `enc` header is present, so this is a JWE.
    #[error("Encrypted tokens are not supported")]
    EncryptedToken,

    /// The algorithm is recognized but cannot be verified.
    #[error("Algorithm {0} is not supported yet")]
    UnsupportedAlgorithm(String),

    /// The header `kid` names no available key.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The key named by `kid` is of the wrong type for the algorithm.
    #[error("Key {kid} is not of type {expected}")]
    KeyTypeMismatch {
        /// The requested key id.
        kid: String,
        /// The key type the algorithm requires.
        expected: KeyType,
    },

    /// No key of the required type is available.
    #[error("No {key_type} keys available to verify {algorithm}")]
    NoMatchingKeys {
        /// The token algorithm.
        algorithm: String,
        /// The key type the algorithm requires.
        key_type: KeyType,
    },

    /// None of the candidate keys verified the signature.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// A required claim is absent.
    #[error("Missing claim: {0}")]
    MissingClaim(String),

    /// A registered claim has the wrong JSON type.
    #[error(transparent)]
    InvalidClaim(#[from] ClaimError),

    /// `iss` differs from the expected issuer.
    #[error("Invalid issuer: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The expected issuer.
        expected: String,
        /// The token issuer.
        actual: String,
    },

    /// `aud` does not contain the client id.
    #[error("Invalid audience: {expected} is not an audience of the token")]
    AudienceMismatch {
        /// The client id.
        expected: String,
    },

    /// `azp` is present and differs from the client id.
    #[error("Invalid authorized party: expected {expected}, got {actual}")]
    AuthorizedPartyMismatch {
        /// The client id.
        expected: String,
        /// The token `azp`.
        actual: String,
    },

    /// `iat` lies in the future beyond the clock skew.
    #[error("The token was issued in the future")]
    IssuedInFuture,

    /// `nbf` lies in the future beyond the clock skew.
    #[error("The token is not yet valid")]
    NotYetValid,

    /// `exp` lies in the past beyond the clock skew.
    #[error("The token is expired")]
    Expired,

    /// The `nonce` claim differs from the nonce sent in the request.
    #[error("Invalid nonce")]
    NonceMismatch,
}

impl TokenError {
    /// Create an `InvalidEncoding` error.
    #[must_use]
    pub fn invalid_encoding(part: &'static str, detail: impl fmt::Display) -> Self {
        Self::InvalidEncoding {
            part,
            detail: detail.to_string(),
        }
    }

    /// Create an `IssuerMismatch` error.
    #[must_use]
    pub fn issuer_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IssuerMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a `MissingClaim` error.
    #[must_use]
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim(claim.into())
    }

    /// The stage this error belongs to.
    #[must_use]
    pub fn stage(&self) -> ValidationStage {
        match self {
            Self::Empty
            | Self::TooLarge { .. }
            | Self::Malformed
            | Self::InvalidEncoding { .. }
            | Self::MissingSignature
            | Self::UnexpectedSignature => ValidationStage::Format,
            Self::MissingAlgorithm
            | Self::UnknownAlgorithm(_)
            | Self::CriticalHeader
            | Self::EncryptedToken => ValidationStage::Header,
            Self::UnsupportedAlgorithm(_)
            | Self::KeyNotFound(_)
            | Self::KeyTypeMismatch { .. }
            | Self::NoMatchingKeys { .. }
            | Self::InvalidSignature => ValidationStage::Signature,
            Self::MissingClaim(_)
            | Self::InvalidClaim(_)
            | Self::IssuerMismatch { .. }
            | Self::AudienceMismatch { .. }
            | Self::AuthorizedPartyMismatch { .. }
            | Self::IssuedInFuture
            | Self::NotYetValid
            | Self::Expired
            | Self::NonceMismatch => ValidationStage::Payload,
        }
    }

    /// Returns `true` for time-based rejections.
    #[must_use]
    pub fn is_time_error(&self) -> bool {
        matches!(self, Self::IssuedInFuture | Self::NotYetValid | Self::Expired)
    }
}
