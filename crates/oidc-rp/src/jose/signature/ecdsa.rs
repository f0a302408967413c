use p256::ecdsa::signature::Verifier;

use super::{SignatureValidator, key_bytes};
use crate::jose::algorithm::{JwsAlgorithm, KeyType};
use crate::jose::jwk::SigningKey;

/// ES256/384/512 verification.
///
/// The curve and hash are implied by the algorithm: P-256 with SHA-256,
/// P-384 with SHA-384 and P-521 with SHA-512. Signatures are the raw
/// fixed-size `r || s` concatenation mandated by RFC 7518.
#[derive(Debug, Clone, Copy)]
pub struct EcdsaValidator {
    algorithm: JwsAlgorithm,
}

impl EcdsaValidator {
    /// Creates a validator for an ES* algorithm.
    #[must_use]
    pub fn new(algorithm: JwsAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The `crv` a key must declare and the coordinate size in bytes.
    fn curve(&self) -> Option<(&'static str, usize)> {
        match self.algorithm {
            JwsAlgorithm::ES256 => Some(("P-256", 32)),
            JwsAlgorithm::ES384 => Some(("P-384", 48)),
            JwsAlgorithm::ES512 => Some(("P-521", 66)),
            _ => None,
        }
    }

    /// SEC1 uncompressed point `0x04 || x || y`.
    fn encoded_point(&self, key: &SigningKey) -> Option<Vec<u8>> {
        let (_, size) = self.curve()?;
        let x = key_bytes(key.x.as_ref())?;
        let y = key_bytes(key.y.as_ref())?;
        if x.len() != size || y.len() != size {
            return None;
        }

        let mut point = Vec::with_capacity(1 + 2 * size);
        point.push(0x04);
        point.extend_from_slice(&x);
        point.extend_from_slice(&y);
        Some(point)
    }
}

impl SignatureValidator for EcdsaValidator {
    fn algorithm(&self) -> JwsAlgorithm {
        self.algorithm
    }

    fn key_type(&self) -> KeyType {
        KeyType::EllipticCurve
    }

    fn is_valid_key(&self, key: &SigningKey) -> bool {
        let Some((crv, _)) = self.curve() else {
            return false;
        };
        key.key_type() == Some(KeyType::EllipticCurve)
            && key.crv.as_deref() == Some(crv)
            && key_bytes(key.x.as_ref()).is_some()
            && key_bytes(key.y.as_ref()).is_some()
    }

    fn verify(&self, signed: &[u8], signature: &[u8], key: &SigningKey) -> bool {
        if !self.is_valid_key(key) {
            return false;
        }
        let Some(point) = self.encoded_point(key) else {
            return false;
        };

        match self.algorithm {
            JwsAlgorithm::ES256 => {
                let Ok(verifying_key) = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point) else {
                    return false;
                };
                let Ok(signature) = p256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                verifying_key.verify(signed, &signature).is_ok()
            }
            JwsAlgorithm::ES384 => {
                let Ok(verifying_key) = p384::ecdsa::VerifyingKey::from_sec1_bytes(&point) else {
                    return false;
                };
                let Ok(signature) = p384::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                verifying_key.verify(signed, &signature).is_ok()
            }
            JwsAlgorithm::ES512 => {
                let Ok(verifying_key) = p521::ecdsa::VerifyingKey::from_sec1_bytes(&point) else {
                    return false;
                };
                let Ok(signature) = p521::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                verifying_key.verify(signed, &signature).is_ok()
            }
            _ => false,
        }
    }
}
