//! Compact JWS structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::TokenError;
use crate::crypto::base64url_decode;

/// The protected header of a compact JWS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// Signature algorithm as written in the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Content type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,

    /// Critical extensions. Never supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crit: Option<Value>,

    /// JWE content encryption. Its presence marks an encrypted token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc: Option<Value>,

    /// Any other header member.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A compact JWS split into its three parts, with header and payload decoded.
#[derive(Debug, Clone)]
pub struct CompactJws<'a> {
    /// `base64url(header).base64url(payload)`, the bytes that were signed.
    pub signing_input: &'a str,
    /// Decoded header.
    pub header: JwsHeader,
    /// Decoded payload object.
    pub payload: Map<String, Value>,
    /// Decoded signature, empty for unsecured tokens.
    pub signature: Vec<u8>,
}

impl<'a> CompactJws<'a> {
    /// Splits and decodes a token that already matched the compact shape.
    pub fn decode(token: &'a str) -> Result<Self, TokenError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (header, payload) = signing_input.split_once('.').ok_or(TokenError::Malformed)?;

        let header: JwsHeader = decode_json("header", header)?;
        let payload: Map<String, Value> = decode_json("payload", payload)?;
        let signature =
            base64url_decode(signature).map_err(|e| TokenError::invalid_encoding("signature", e))?;

        Ok(Self {
            signing_input,
            header,
            payload,
            signature,
        })
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(
    part: &'static str,
    encoded: &str,
) -> Result<T, TokenError> {
    let bytes = base64url_decode(encoded).map_err(|e| TokenError::invalid_encoding(part, e))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::invalid_encoding(part, e))
}
