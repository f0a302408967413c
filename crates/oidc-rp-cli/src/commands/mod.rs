pub mod auth;
pub mod provider;

use anyhow::{Result, bail};

/// Splits `key=value` arguments.
pub fn parse_pairs(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("Expected KEY=VALUE, got \"{pair}\""),
        })
        .collect()
}
