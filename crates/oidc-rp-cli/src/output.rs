use std::collections::BTreeMap;

use colored::Colorize;
use oidc_rp::UserSession;
use serde_json::Value;
use time::OffsetDateTime;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

pub fn print_field(name: &str, value: impl std::fmt::Display) {
    println!("{}: {}", name.cyan(), value);
}

pub fn print_data(data: &BTreeMap<String, String>) {
    for (key, value) in data {
        println!("  {key} = {value}");
    }
}

pub fn print_session(session: &UserSession) {
    let user = &session.user;
    print_field("Issuer", &user.issuer);
    print_field("Subject", user.sub().ok().flatten().unwrap_or("-"));
    if let Ok(Some(name)) = user.name() {
        print_field("Name", name);
    }
    if let Ok(Some(email)) = user.email() {
        print_field("Email", email);
    }
    if let Ok(roles) = user.roles()
        && !roles.is_empty()
    {
        print_field("Roles", roles.join(", "));
    }
    if !session.scopes.is_empty() {
        print_field("Scopes", session.scopes.join(" "));
    }
    match session.expires_in(OffsetDateTime::now_utc()) {
        Some(left) => print_field("Expires in", format!("{}s", left.as_secs())),
        None if session.expires_at.is_some() => print_field("Expires in", "expired".red()),
        None => {}
    }
    if let Some(token) = &session.access_token {
        print_field("Access token", preview(token));
    }
    if !session.request_data.is_empty() {
        println!("{}:", "Request data".cyan());
        print_data(&session.request_data);
    }
}

/// First and last characters of a secret.
pub fn preview(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 20 {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("{head}...{tail}")
    } else {
        secret.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("short"), "short");
        assert_eq!(
            preview("eyJhbGciOiJFUzI1NiJ9.payload.signature"),
            "eyJhbGci...ignature"
        );
    }
}
