use anyhow::{Context, Result};
use colored::Colorize;
use oidc_rp::{JwtValidator, UserManager};

use crate::output::{print_field, print_json};

pub async fn discover(manager: &UserManager) -> Result<()> {
    let endpoints = manager
        .metadata()
        .endpoints()
        .await
        .context("Failed to resolve provider metadata")?;
    let value = serde_json::to_value(&endpoints)?;
    if let Some(fields) = value.as_object() {
        for (name, url) in fields {
            print_field(name, url.as_str().unwrap_or("-"));
        }
    }
    Ok(())
}

pub fn inspect(token: &str) -> Result<()> {
    let decoded = JwtValidator::default()
        .decode_unverified(token.trim())
        .context("Not a valid JWT")?;
    println!(
        "{} {}",
        "!".yellow(),
        "Signature not verified".yellow()
    );
    print_field("Algorithm", decoded.algorithm.as_str());
    println!("{}:", "Header".cyan());
    print_json(&serde_json::to_value(&decoded.header)?);
    println!("{}:", "Payload".cyan());
    print_json(&serde_json::to_value(&decoded.payload.claims)?);
    Ok(())
}
