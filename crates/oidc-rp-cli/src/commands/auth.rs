use anyhow::{Context, Result};
use colored::Colorize;
use oidc_rp::{AuthParameters, LogoutParameters, UserManager};

use super::parse_pairs;
use crate::cli::{LoginArgs, LogoutArgs};
use crate::output::{print_data, print_error, print_field, print_session, print_success};

pub async fn login(manager: &UserManager, args: &LoginArgs) -> Result<()> {
    let mut params = AuthParameters {
        interaction: args.interaction.map(Into::into),
        scope: args.scope.clone(),
        login_hint: args.login_hint.clone(),
        ..AuthParameters::default()
    };
    for (name, value) in parse_pairs(&args.params)? {
        params = params.with_parameter(name, value);
    }
    for (key, value) in parse_pairs(&args.data)? {
        params = params.with_state_data(key, value);
    }

    let request = manager
        .begin_authentication(params)
        .await
        .context("Failed to start sign-in")?;
    print_success(&format!(
        "Sign-in started ({} interaction)",
        request.interaction
    ));
    println!(
        "After signing in, run: {} '<callback url>'",
        "oidc-rp callback".cyan()
    );
    Ok(())
}

pub async fn callback(manager: &UserManager, url: &str) -> Result<()> {
    let session = manager
        .complete_authentication(url)
        .await
        .context("Failed to complete sign-in")?;
    print_success("Signed in");
    print_session(&session);
    Ok(())
}

pub async fn logout(manager: &UserManager, args: &LogoutArgs) -> Result<()> {
    manager.load_user().await?;

    let mut params = LogoutParameters {
        interaction: args.interaction.map(Into::into),
        post_logout_redirect_uri: args.post_logout_redirect_uri.clone(),
        ..LogoutParameters::default()
    };
    for (key, value) in parse_pairs(&args.data)? {
        params = params.with_state_data(key, value);
    }

    match manager
        .begin_logout(params)
        .await
        .context("Failed to start sign-out")?
    {
        Some(_) => {
            print_success("Signed out locally");
            println!(
                "After the provider redirects, run: {} '<redirect url>'",
                "oidc-rp logout-callback".cyan()
            );
        }
        None => println!("No user signed in"),
    }
    Ok(())
}

pub async fn logout_callback(manager: &UserManager, url: &str) -> Result<()> {
    let state = manager
        .complete_logout(url)
        .await
        .context("Failed to complete sign-out")?;
    print_success("Signed out");
    if let Some(state) = state {
        print_field("Request", &state.id);
        if let Some(data) = &state.data {
            print_data(data);
        }
    }
    Ok(())
}

pub async fn whoami(manager: &UserManager, profile: &str) -> Result<()> {
    match manager.load_user().await? {
        Some(session) => {
            print_field("Profile", profile);
            print_session(&session);
        }
        None => print_error(&format!("Not signed in (profile: \"{profile}\")")),
    }
    Ok(())
}
