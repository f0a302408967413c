//! Cryptographic primitives used across the relying party.
//!
//! Random values come from the thread-local CSPRNG; encodings are always
//! unpadded base64url as mandated for JOSE and PKCE.

pub mod pkce;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub use pkce::{PkceChallenge, PkceChallengeMethod, PkcePair, PkceVerifier};

/// Number of random bytes behind `state` and `nonce` values (128 bits).
pub const STATE_BYTES: usize = 16;

/// Returns `len` cryptographically random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Returns `len` random bytes encoded as lowercase hex.
#[must_use]
pub fn random_hex(len: usize) -> String {
    hex::encode(random_bytes(len))
}

/// Generates a fresh 128-bit identifier as 32 hex characters.
///
/// Used for the `state` and `nonce` request parameters.
#[must_use]
pub fn random_id() -> String {
    random_hex(STATE_BYTES)
}

/// SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Encodes bytes as unpadded base64url.
#[must_use]
pub fn base64url_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decodes unpadded base64url.
///
/// Trailing `=` padding is tolerated since some providers emit it in JWKS values.
pub fn base64url_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(input.trim_end_matches('='))
}
