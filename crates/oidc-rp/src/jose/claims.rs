//! Ordered claim sets with typed accessors.
//!
//! Claims keep the order in which the provider emitted them. Accessors never
//! fall back to a default: an absent claim is `Ok(None)` and a claim of the
//! wrong JSON type is an error, whether or not the claim is required.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registered claims that only carry protocol meaning.
///
/// Removed from the user claims when protocol claim filtering is enabled.
pub const PROTOCOL_CLAIMS: [&str; 8] = ["nonce", "at_hash", "iat", "nbf", "exp", "aud", "iss", "c_hash"];

/// Failure to read a claim with the requested type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    /// A required claim is absent.
    #[error("Missing claim: {0}")]
    Missing(String),

    /// The claim exists but has an unexpected JSON type.
    #[error("Claim {claim} must be {expected}")]
    InvalidType {
        /// The claim name.
        claim: String,
        /// A description of the expected type.
        expected: &'static str,
    },
}

impl ClaimError {
    fn invalid_type(claim: &str, expected: &'static str) -> Self {
        Self::InvalidType {
            claim: claim.to_string(),
            expected,
        }
    }
}

/// An ordered map from claim name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(IndexMap<String, Value>);

impl Claims {
    /// Creates an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw access to a claim.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns `true` if the claim is present (even when `null`).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Inserts or replaces a claim, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    /// Removes a claim keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    /// Number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates claims in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// A string claim.
    pub fn string(&self, name: &str) -> Result<Option<&str>, ClaimError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(ClaimError::invalid_type(name, "a string")),
        }
    }

    /// A required string claim.
    pub fn require_string(&self, name: &str) -> Result<&str, ClaimError> {
        self.string(name)?
            .ok_or_else(|| ClaimError::Missing(name.to_string()))
    }

    /// A boolean claim.
    pub fn bool(&self, name: &str) -> Result<Option<bool>, ClaimError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(ClaimError::invalid_type(name, "a boolean")),
        }
    }

    /// A NumericDate claim in seconds since the epoch.
    ///
    /// Fractional values are truncated toward negative infinity.
    pub fn numeric_date(&self, name: &str) -> Result<Option<i64>, ClaimError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64))
                .map(Some)
                .ok_or_else(|| ClaimError::invalid_type(name, "a NumericDate")),
            Some(_) => Err(ClaimError::invalid_type(name, "a NumericDate")),
        }
    }

    /// A claim that may be a single string or an array of strings.
    pub fn strings(&self, name: &str) -> Result<Option<Vec<String>>, ClaimError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Some)
                .ok_or_else(|| ClaimError::invalid_type(name, "a string or an array of strings")),
            Some(_) => Err(ClaimError::invalid_type(name, "a string or an array of strings")),
        }
    }

    /// Copies claims from `other` that are not already present.
    ///
    /// Existing values always win.
    pub fn merge_missing(&mut self, other: Claims) {
        for (name, value) in other.0 {
            self.0.entry(name).or_insert(value);
        }
    }

    /// Drops the protocol-only claims listed in [`PROTOCOL_CLAIMS`].
    pub fn remove_protocol_claims(&mut self) {
        self.0.retain(|name, _| !PROTOCOL_CLAIMS.contains(&name.as_str()));
    }
}

impl From<IndexMap<String, Value>> for Claims {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Claims {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
