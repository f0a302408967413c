use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

use super::{SignatureValidator, key_bytes};
use crate::jose::algorithm::{HashWidth, JwsAlgorithm, KeyType};
use crate::jose::jwk::SigningKey;

/// HS256/384/512 verification with a shared secret.
#[derive(Debug, Clone, Copy)]
pub struct HmacValidator {
    algorithm: JwsAlgorithm,
}

impl HmacValidator {
    /// Creates a validator for an HS* algorithm.
    #[must_use]
    pub fn new(algorithm: JwsAlgorithm) -> Self {
        Self { algorithm }
    }
}

impl SignatureValidator for HmacValidator {
    fn algorithm(&self) -> JwsAlgorithm {
        self.algorithm
    }

    fn key_type(&self) -> KeyType {
        KeyType::Octet
    }

    fn is_valid_key(&self, key: &SigningKey) -> bool {
        key.key_type() == Some(KeyType::Octet) && key_bytes(key.k.as_ref()).is_some()
    }

    fn verify(&self, signed: &[u8], signature: &[u8], key: &SigningKey) -> bool {
        let Some(secret) = key_bytes(key.k.as_ref()) else {
            return false;
        };

        match self.algorithm.hash_width() {
            Some(HashWidth::Sha256) => mac_matches::<Hmac<Sha256>>(&secret, signed, signature),
            Some(HashWidth::Sha384) => mac_matches::<Hmac<Sha384>>(&secret, signed, signature),
            Some(HashWidth::Sha512) => mac_matches::<Hmac<Sha512>>(&secret, signed, signature),
            None => false,
        }
    }
}

// verify_slice compares in constant time
fn mac_matches<M: Mac + KeyInit>(secret: &[u8], signed: &[u8], signature: &[u8]) -> bool {
    match <M as KeyInit>::new_from_slice(secret) {
        Ok(mut mac) => {
            Mac::update(&mut mac, signed);
            mac.verify_slice(signature).is_ok()
        }
        Err(_) => false,
    }
}
