//! JOSE support: JWS parsing, JWK key sets and identity token validation.
//!
//! # Overview
//!
//! - [`JwtValidator`] - the four-stage identity token validator
//! - [`SignatureValidator`] - per-family signature verification
//! - [`Claims`] - ordered claim map with typed accessors
//! - [`SigningKey`] / [`JsonWebKeySet`] - verification keys
//!
//! JWE is not supported. Tokens carrying an `enc` header are rejected.

pub mod algorithm;
pub mod claims;
pub mod error;
pub mod jwk;
pub mod jws;
pub mod signature;
pub mod validator;

pub use algorithm::{AlgorithmFamily, HashWidth, JwsAlgorithm, KeyType};
pub use claims::{ClaimError, Claims, PROTOCOL_CLAIMS};
pub use error::{TokenError, ValidationStage};
pub use jwk::{JsonWebKeySet, SigningKey};
pub use jws::JwsHeader;
pub use signature::{SignatureValidator, validator_for};
pub use validator::{DecodedToken, JwtValidator, SignaturePolicy, TokenExpectations, TokenPayload};
