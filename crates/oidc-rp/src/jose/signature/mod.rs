//! JWS signature verification.
//!
//! # Overview
//!
//! Each algorithm family has one [`SignatureValidator`] implementation:
//!
//! - [`HmacValidator`] - HS256/384/512 with `oct` keys
//! - [`RsaValidator`] - RS256/384/512 (PKCS#1 v1.5) with `RSA` keys
//! - [`EcdsaValidator`] - ES256/384/512 with `EC` keys on P-256/P-384/P-521
//!
//! [`validator_for`] maps an algorithm onto its family. RSASSA-PSS is
//! recognized but rejected with [`TokenError::UnsupportedAlgorithm`].
//!
//! # Key Selection
//!
//! When the token header names a `kid`, that key must exist and be of the
//! family's key type. Without a `kid` every signing key of the family's type
//! is tried until one verifies. Keys that fail [`SignatureValidator::is_valid_key`]
//! are skipped, never trusted.

mod ecdsa;
mod mac;
mod pkcs1;

pub use ecdsa::EcdsaValidator;
pub use mac::HmacValidator;
pub use pkcs1::RsaValidator;

use super::algorithm::{AlgorithmFamily, JwsAlgorithm, KeyType};
use super::error::TokenError;
use super::jwk::SigningKey;
use crate::crypto::base64url_decode;

/// Verification capability shared by all algorithm families.
pub trait SignatureValidator: Send + Sync {
    /// The algorithm this validator verifies.
    fn algorithm(&self) -> JwsAlgorithm;

    /// The key type keys must have.
    fn key_type(&self) -> KeyType;

    /// Returns `true` if `key` carries the members this family needs.
    fn is_valid_key(&self, key: &SigningKey) -> bool;

    /// Verifies `signature` over `signed` with `key`.
    fn verify(&self, signed: &[u8], signature: &[u8], key: &SigningKey) -> bool;

    /// Selects candidate keys and verifies the signature with them.
    fn validate(
        &self,
        signed: &[u8],
        signature: &[u8],
        kid: Option<&str>,
        keys: &[SigningKey],
    ) -> Result<(), TokenError> {
        let key_type = self.key_type();

        let candidates: Vec<&SigningKey> = match kid {
            Some(kid) => {
                let key = keys
                    .iter()
                    .find(|k| k.kid.as_deref() == Some(kid))
                    .ok_or_else(|| TokenError::KeyNotFound(kid.to_string()))?;
                if key.key_type() != Some(key_type) {
                    return Err(TokenError::KeyTypeMismatch {
                        kid: kid.to_string(),
                        expected: key_type,
                    });
                }
                vec![key]
            }
            None => keys
                .iter()
                .filter(|k| k.key_type() == Some(key_type) && k.is_signing_key())
                .collect(),
        };

        if candidates.is_empty() {
            return Err(TokenError::NoMatchingKeys {
                algorithm: self.algorithm().to_string(),
                key_type,
            });
        }

        for key in candidates {
            if !self.is_valid_key(key) {
                tracing::trace!(
                    "Skipping {} key {:?}: missing key material",
                    key_type,
                    key.kid
                );
                continue;
            }
            if self.verify(signed, signature, key) {
                tracing::trace!("Signature verified with key {:?}", key.kid);
                return Ok(());
            }
        }

        Err(TokenError::InvalidSignature)
    }
}

/// Returns the validator for `algorithm`.
///
/// # Errors
///
/// Returns [`TokenError::UnsupportedAlgorithm`] for PS256/384/512 and for
/// `none`, which has no signature to verify.
pub fn validator_for(algorithm: JwsAlgorithm) -> Result<Box<dyn SignatureValidator>, TokenError> {
    match algorithm.family() {
        Some(AlgorithmFamily::Hmac) => Ok(Box::new(HmacValidator::new(algorithm))),
        Some(AlgorithmFamily::Rsa) => Ok(Box::new(RsaValidator::new(algorithm))),
        Some(AlgorithmFamily::Ecdsa) => Ok(Box::new(EcdsaValidator::new(algorithm))),
        Some(AlgorithmFamily::RsaPss) | None => {
            Err(TokenError::UnsupportedAlgorithm(algorithm.to_string()))
        }
    }
}

/// Decodes a required base64url key member, `None` if absent or invalid.
pub(crate) fn key_bytes(member: Option<&String>) -> Option<Vec<u8>> {
    member
        .filter(|value| !value.is_empty())
        .and_then(|value| base64url_decode(value).ok())
}
