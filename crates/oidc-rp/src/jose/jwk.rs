//! JSON Web Keys used to verify identity token signatures.

use serde::{Deserialize, Serialize};

use super::algorithm::KeyType;

/// A public (or shared secret) JSON Web Key.
///
/// Only the members needed for signature verification are modelled. All
/// key material stays in its base64url form until a validator decodes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Key type (`RSA`, `EC`, `oct`).
    pub kty: String,

    /// Intended algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended use (`sig`, `enc`).
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// RSA modulus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// EC curve name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Symmetric secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl SigningKey {
    fn empty(kty: KeyType) -> Self {
        Self {
            kty: kty.as_str().to_string(),
            alg: None,
            kid: None,
            key_use: None,
            n: None,
            e: None,
            crv: None,
            x: None,
            y: None,
            k: None,
        }
    }

    /// A symmetric key from a base64url secret.
    #[must_use]
    pub fn symmetric(k: impl Into<String>) -> Self {
        Self {
            k: Some(k.into()),
            ..Self::empty(KeyType::Octet)
        }
    }

    /// An RSA public key from base64url modulus and exponent.
    #[must_use]
    pub fn rsa(n: impl Into<String>, e: impl Into<String>) -> Self {
        Self {
            n: Some(n.into()),
            e: Some(e.into()),
            ..Self::empty(KeyType::Rsa)
        }
    }

    /// An EC public key from a curve name and base64url coordinates.
    #[must_use]
    pub fn ec(crv: impl Into<String>, x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            crv: Some(crv.into()),
            x: Some(x.into()),
            y: Some(y.into()),
            ..Self::empty(KeyType::EllipticCurve)
        }
    }

    /// Sets the key id.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Sets the intended algorithm.
    #[must_use]
    pub fn with_alg(mut self, alg: impl Into<String>) -> Self {
        self.alg = Some(alg.into());
        self
    }

    /// Sets the intended use.
    #[must_use]
    pub fn with_use(mut self, key_use: impl Into<String>) -> Self {
        self.key_use = Some(key_use.into());
        self
    }

    /// The parsed key type, `None` for unknown `kty` values.
    #[must_use]
    pub fn key_type(&self) -> Option<KeyType> {
        KeyType::parse(&self.kty)
    }

    /// Returns `false` for keys published for encryption only.
    #[must_use]
    pub fn is_signing_key(&self) -> bool {
        self.key_use.as_deref() != Some("enc")
    }
}

/// A JSON Web Key Set document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// The keys.
    #[serde(default)]
    pub keys: Vec<SigningKey>,
}

impl JsonWebKeySet {
    /// Creates a key set.
    #[must_use]
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// Looks up a key by id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_key_set() {
        let jwks: JsonWebKeySet = serde_json::from_value(json!({
            "keys": [
                {"kty": "RSA", "kid": "r1", "use": "sig", "alg": "RS256", "n": "AQAB", "e": "AQAB"},
                {"kty": "EC", "kid": "e1", "crv": "P-256", "x": "xx", "y": "yy"},
                {"kty": "oct", "k": "c2VjcmV0"},
                {"kty": "OKP", "crv": "Ed25519", "x": "zz"}
            ]
        }))
        .unwrap();

        assert_eq!(jwks.keys.len(), 4);
        assert_eq!(jwks.find("r1").unwrap().key_type(), Some(KeyType::Rsa));
        assert_eq!(jwks.find("e1").unwrap().crv.as_deref(), Some("P-256"));
        assert_eq!(jwks.keys[2].key_type(), Some(KeyType::Octet));
        assert_eq!(jwks.keys[3].key_type(), None);
        assert!(jwks.find("missing").is_none());
    }

    #[test]
    fn test_missing_keys_member() {
        let jwks: JsonWebKeySet = serde_json::from_str("{}").unwrap();
        assert!(jwks.keys.is_empty());
    }

    #[test]
    fn test_builders() {
        let key = SigningKey::rsa("n", "e").with_kid("k1").with_use("enc");
        assert_eq!(key.kty, "RSA");
        assert_eq!(key.kid.as_deref(), Some("k1"));
        assert!(!key.is_signing_key());
        assert!(SigningKey::symmetric("k").is_signing_key());
    }

    #[test]
    fn test_serialize_skips_absent_members() {
        let value = serde_json::to_value(SigningKey::symmetric("abc")).unwrap();
        assert_eq!(value, json!({"kty": "oct", "k": "abc"}));
    }
}
