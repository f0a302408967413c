//! JWS algorithm identifiers and their mapping to key families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The `kty` of a JSON Web Key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Symmetric secret (`oct`).
    #[serde(rename = "oct")]
    Octet,
    /// RSA public key (`RSA`).
    #[serde(rename = "RSA")]
    Rsa,
    /// Elliptic curve public key (`EC`).
    #[serde(rename = "EC")]
    EllipticCurve,
}

impl KeyType {
    /// The registered `kty` value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Octet => "oct",
            Self::Rsa => "RSA",
            Self::EllipticCurve => "EC",
        }
    }

    /// Parse a `kty` value. Matching is case-sensitive.
    #[must_use]
    pub fn parse(kty: &str) -> Option<Self> {
        match kty {
            "oct" => Some(Self::Octet),
            "RSA" => Some(Self::Rsa),
            "EC" => Some(Self::EllipticCurve),
            _ => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash width used by an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashWidth {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

/// Algorithm family, each verified by one [`SignatureValidator`](super::signature::SignatureValidator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    /// HMAC with SHA-2.
    Hmac,
    /// RSASSA-PKCS1-v1_5 with SHA-2.
    Rsa,
    /// ECDSA over the NIST curves.
    Ecdsa,
    /// RSASSA-PSS, recognized but not supported.
    RsaPss,
}

impl AlgorithmFamily {
    /// The key type a key must have to verify this family.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Hmac => KeyType::Octet,
            Self::Rsa | Self::RsaPss => KeyType::Rsa,
            Self::Ecdsa => KeyType::EllipticCurve,
        }
    }
}

/// A recognized JWS `alg` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JwsAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
    /// ECDSA using P-521 and SHA-512
    ES512,
    /// RSASSA-PSS using SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512
    PS512,
    /// Unsecured JWS
    None,
}

impl JwsAlgorithm {
    /// The `alg` header value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::None => "none",
        }
    }

    /// The family that verifies this algorithm, `None` for `alg=none`.
    #[must_use]
    pub fn family(&self) -> Option<AlgorithmFamily> {
        match self {
            Self::HS256 | Self::HS384 | Self::HS512 => Some(AlgorithmFamily::Hmac),
            Self::RS256 | Self::RS384 | Self::RS512 => Some(AlgorithmFamily::Rsa),
            Self::ES256 | Self::ES384 | Self::ES512 => Some(AlgorithmFamily::Ecdsa),
            Self::PS256 | Self::PS384 | Self::PS512 => Some(AlgorithmFamily::RsaPss),
            Self::None => None,
        }
    }

    /// The hash width, `None` for `alg=none`.
    #[must_use]
    pub fn hash_width(&self) -> Option<HashWidth> {
        match self {
            Self::HS256 | Self::RS256 | Self::ES256 | Self::PS256 => Some(HashWidth::Sha256),
            Self::HS384 | Self::RS384 | Self::ES384 | Self::PS384 => Some(HashWidth::Sha384),
            Self::HS512 | Self::RS512 | Self::ES512 | Self::PS512 => Some(HashWidth::Sha512),
            Self::None => None,
        }
    }

    /// Returns `true` for `alg=none`.
    #[must_use]
    pub fn is_unsecured(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl FromStr for JwsAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "HS256" => Self::HS256,
            "HS384" => Self::HS384,
            "HS512" => Self::HS512,
            "RS256" => Self::RS256,
            "RS384" => Self::RS384,
            "RS512" => Self::RS512,
            "ES256" => Self::ES256,
            "ES384" => Self::ES384,
            "ES512" => Self::ES512,
            "PS256" => Self::PS256,
            "PS384" => Self::PS384,
            "PS512" => Self::PS512,
            "none" => Self::None,
            other => return Err(other.to_string()),
        })
    }
}

impl fmt::Display for JwsAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
