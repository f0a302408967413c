use ::rsa::pkcs1v15::{Signature, VerifyingKey};
use ::rsa::signature::Verifier;
use ::rsa::{BigUint, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};

use super::{SignatureValidator, key_bytes};
use crate::jose::algorithm::{HashWidth, JwsAlgorithm, KeyType};
use crate::jose::jwk::SigningKey;

/// RS256/384/512 verification (RSASSA-PKCS1-v1_5).
#[derive(Debug, Clone, Copy)]
pub struct RsaValidator {
    algorithm: JwsAlgorithm,
}

impl RsaValidator {
    /// Creates a validator for an RS* algorithm.
    #[must_use]
    pub fn new(algorithm: JwsAlgorithm) -> Self {
        Self { algorithm }
    }

    fn public_key(key: &SigningKey) -> Option<RsaPublicKey> {
        let n = key_bytes(key.n.as_ref())?;
        let e = key_bytes(key.e.as_ref())?;
        match RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e)) {
            Ok(public_key) => Some(public_key),
            Err(e) => {
                tracing::debug!("Rejecting RSA key {:?}: {}", key.kid, e);
                None
            }
        }
    }
}

impl SignatureValidator for RsaValidator {
    fn algorithm(&self) -> JwsAlgorithm {
        self.algorithm
    }

    fn key_type(&self) -> KeyType {
        KeyType::Rsa
    }

    fn is_valid_key(&self, key: &SigningKey) -> bool {
        key.key_type() == Some(KeyType::Rsa)
            && key_bytes(key.n.as_ref()).is_some()
            && key_bytes(key.e.as_ref()).is_some()
    }

    fn verify(&self, signed: &[u8], signature: &[u8], key: &SigningKey) -> bool {
        let Some(public_key) = Self::public_key(key) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };

        match self.algorithm.hash_width() {
            Some(HashWidth::Sha256) => VerifyingKey::<Sha256>::new(public_key)
                .verify(signed, &signature)
                .is_ok(),
            Some(HashWidth::Sha384) => VerifyingKey::<Sha384>::new(public_key)
                .verify(signed, &signature)
                .is_ok(),
            Some(HashWidth::Sha512) => VerifyingKey::<Sha512>::new(public_key)
                .verify(signed, &signature)
                .is_ok(),
            None => false,
        }
    }
}
