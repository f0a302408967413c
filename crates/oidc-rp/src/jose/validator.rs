//! Identity token validation.
//!
//! # Overview
//!
//! A compact JWT goes through four checks, each consuming the output of the
//! previous one:
//!
//! 1. **Format** - size, compact shape, base64url JSON header and payload
//! 2. **Header** - a recognized `alg`, no `crit`, no `enc`
//! 3. **Signature** - key selection and verification, see [`super::signature`]
//! 4. **Payload** - `iss`, `aud`, `azp`, `iat`, `nbf`, `exp` and `nonce`
//!
//! The intermediate stages are distinct types, so a later check can only run
//! on a token that passed every earlier one. The first failure aborts with a
//! [`TokenError`] whose [`TokenError::stage`] names the failing check.
//!
//! # Security Considerations
//!
//! [`SignaturePolicy::TrustedChannel`] skips the signature check. It is only
//! used for tokens received directly from the token endpoint over TLS in
//! exchange for a PKCE-bound authorization code.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use time::OffsetDateTime;

use super::algorithm::JwsAlgorithm;
use super::claims::Claims;
use super::error::TokenError;
use super::jwk::SigningKey;
use super::jws::{CompactJws, JwsHeader};
use super::signature::validator_for;
use crate::config::TokenSettings;

static COMPACT_JWS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-_]+\.[A-Za-z0-9\-_]+\.[A-Za-z0-9\-_]*$")
        .expect("Invalid compact JWS regex")
});

/// Where the token came from and therefore how its signature is treated.
#[derive(Debug, Clone, Copy)]
pub enum SignaturePolicy<'a> {
    /// Verify against these keys.
    Verify(&'a [SigningKey]),
    /// Received directly from the token endpoint; the signature is not checked.
    TrustedChannel,
}

/// What a token must satisfy to be accepted.
#[derive(Debug, Clone, Copy)]
pub struct TokenExpectations<'a> {
    /// Required `iss`.
    pub issuer: &'a str,
    /// Client id that must appear in `aud` and match `azp`.
    pub audience: &'a str,
    /// Required `nonce`, for implicit flows.
    pub nonce: Option<&'a str>,
    /// Signature handling.
    pub signature: SignaturePolicy<'a>,
    /// Reference time for `iat`, `nbf` and `exp`.
    pub now: OffsetDateTime,
}

/// Registered claims of a token, plus every claim in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPayload {
    /// `iss`
    pub issuer: Option<String>,
    /// `aud`, a single string on the wire becomes one element.
    pub audience: Vec<String>,
    /// `azp`
    pub authorized_party: Option<String>,
    /// `iat` in seconds since the epoch.
    pub issued_at: Option<i64>,
    /// `nbf` in seconds since the epoch.
    pub not_before: Option<i64>,
    /// `exp` in seconds since the epoch.
    pub expiration_time: Option<i64>,
    /// `sub`
    pub subject: Option<String>,
    /// `nonce`
    pub nonce: Option<String>,
    /// All claims.
    pub claims: Claims,
}

impl TokenPayload {
    /// Reads the registered claims. A registered claim of the wrong shape is an error.
    pub fn from_claims(claims: Claims) -> Result<Self, TokenError> {
        Ok(Self {
            issuer: claims.string("iss")?.map(str::to_string),
            audience: claims.strings("aud")?.unwrap_or_default(),
            authorized_party: claims.string("azp")?.map(str::to_string),
            issued_at: claims.numeric_date("iat")?,
            not_before: claims.numeric_date("nbf")?,
            expiration_time: claims.numeric_date("exp")?,
            subject: claims.string("sub")?.map(str::to_string),
            nonce: claims.string("nonce")?.map(str::to_string),
            claims,
        })
    }
}

/// A token that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    /// The signature algorithm.
    pub algorithm: JwsAlgorithm,
    /// The protected header.
    pub header: JwsHeader,
    /// The payload.
    pub payload: TokenPayload,
}

/// Validates compact JWS identity tokens.
#[derive(Debug, Clone)]
pub struct JwtValidator {
    max_token_size: usize,
    clock_skew: Duration,
}

impl Default for JwtValidator {
    fn default() -> Self {
        Self::from_settings(&TokenSettings::default())
    }
}

impl JwtValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(max_token_size: usize, clock_skew: Duration) -> Self {
        Self {
            max_token_size,
            clock_skew,
        }
    }

    /// Creates a validator from token settings.
    #[must_use]
    pub fn from_settings(settings: &TokenSettings) -> Self {
        Self::new(settings.max_token_size, settings.clock_skew)
    }

    /// Runs all four checks.
    pub fn validate(
        &self,
        token: &str,
        expectations: &TokenExpectations<'_>,
    ) -> Result<DecodedToken, TokenError> {
        let decoded = self
            .check_format(token)?
            .check_header()?
            .check_signature(expectations.signature)?
            .check_payload(expectations, self.clock_skew)?;

        tracing::debug!(
            "Accepted {} token for subject {:?}",
            decoded.algorithm,
            decoded.payload.subject
        );
        Ok(decoded)
    }

    /// Runs only the format and header checks.
    ///
    /// The result is not authenticated and must never be used to sign a user in.
    pub fn decode_unverified(&self, token: &str) -> Result<DecodedToken, TokenError> {
        let checked = self.check_format(token)?.check_header()?;
        Ok(DecodedToken {
            algorithm: checked.algorithm,
            header: checked.jws.header,
            payload: TokenPayload::from_claims(Claims::from_iter(checked.jws.payload))?,
        })
    }

    fn check_format<'a>(&self, token: &'a str) -> Result<FormatChecked<'a>, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Empty);
        }
        if token.len() > self.max_token_size {
            return Err(TokenError::TooLarge {
                size: token.len(),
                max: self.max_token_size,
            });
        }
        if !COMPACT_JWS.is_match(token) {
            return Err(TokenError::Malformed);
        }

        let jws = CompactJws::decode(token)?;
        let unsecured = jws.header.alg.as_deref() == Some(JwsAlgorithm::None.as_str());
        match (unsecured, jws.signature.is_empty()) {
            (false, true) => return Err(TokenError::MissingSignature),
            (true, false) => return Err(TokenError::UnexpectedSignature),
            _ => {}
        }

        tracing::trace!("Token format is valid");
        Ok(FormatChecked { jws })
    }
}

struct FormatChecked<'a> {
    jws: CompactJws<'a>,
}

impl<'a> FormatChecked<'a> {
    fn check_header(self) -> Result<HeaderChecked<'a>, TokenError> {
        let header = &self.jws.header;
        let alg = header.alg.as_deref().ok_or(TokenError::MissingAlgorithm)?;
        let algorithm: JwsAlgorithm = alg
            .parse()
            .map_err(|_| TokenError::UnknownAlgorithm(alg.to_string()))?;
        if header.crit.is_some() {
            return Err(TokenError::CriticalHeader);
        }
        if header.enc.is_some() {
            return Err(TokenError::EncryptedToken);
        }

        tracing::trace!("Token header is valid, alg {}", algorithm);
        Ok(HeaderChecked {
            jws: self.jws,
            algorithm,
        })
    }
}

struct HeaderChecked<'a> {
    jws: CompactJws<'a>,
    algorithm: JwsAlgorithm,
}

impl<'a> HeaderChecked<'a> {
    fn check_signature(self, policy: SignaturePolicy<'_>) -> Result<SignatureChecked<'a>, TokenError> {
        if self.algorithm.is_unsecured() {
            tracing::debug!("Unsecured token, no signature to verify");
            return Ok(SignatureChecked(self));
        }

        match policy {
            SignaturePolicy::TrustedChannel => {
                tracing::debug!("Token received over a trusted channel, signature not verified");
            }
            SignaturePolicy::Verify(keys) => {
                validator_for(self.algorithm)?.validate(
                    self.jws.signing_input.as_bytes(),
                    &self.jws.signature,
                    self.jws.header.kid.as_deref(),
                    keys,
                )?;
                tracing::trace!("Token signature is valid");
            }
        }
        Ok(SignatureChecked(self))
    }
}

struct SignatureChecked<'a>(HeaderChecked<'a>);

impl SignatureChecked<'_> {
    fn check_payload(
        self,
        expected: &TokenExpectations<'_>,
        clock_skew: Duration,
    ) -> Result<DecodedToken, TokenError> {
        let HeaderChecked { jws, algorithm } = self.0;
        let payload = TokenPayload::from_claims(Claims::from_iter(jws.payload))?;

        let issuer = payload
            .issuer
            .as_deref()
            .ok_or_else(|| TokenError::missing_claim("iss"))?;
        if issuer != expected.issuer {
            return Err(TokenError::issuer_mismatch(expected.issuer, issuer));
        }

        if payload.audience.is_empty() {
            return Err(TokenError::missing_claim("aud"));
        }
        if !payload.audience.iter().any(|aud| aud == expected.audience) {
            return Err(TokenError::AudienceMismatch {
                expected: expected.audience.to_string(),
            });
        }
        if let Some(azp) = payload.authorized_party.as_deref()
            && azp != expected.audience
        {
            return Err(TokenError::AuthorizedPartyMismatch {
                expected: expected.audience.to_string(),
                actual: azp.to_string(),
            });
        }

        let now = expected.now.unix_timestamp();
        let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
        let latest = now.saturating_add(skew);
        let earliest = now.saturating_sub(skew);

        let issued_at = payload
            .issued_at
            .ok_or_else(|| TokenError::missing_claim("iat"))?;
        if issued_at > latest {
            return Err(TokenError::IssuedInFuture);
        }
        if let Some(not_before) = payload.not_before
            && not_before > latest
        {
            return Err(TokenError::NotYetValid);
        }
        let expiration = payload
            .expiration_time
            .ok_or_else(|| TokenError::missing_claim("exp"))?;
        if expiration < earliest {
            return Err(TokenError::Expired);
        }

        if let Some(nonce) = expected.nonce
            && payload.nonce.as_deref() != Some(nonce)
        {
            return Err(TokenError::NonceMismatch);
        }

        Ok(DecodedToken {
            algorithm,
            header: jws.header,
            payload,
        })
    }
}
