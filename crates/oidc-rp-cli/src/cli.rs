use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use oidc_rp::InteractionType;

#[derive(Parser)]
#[command(name = "oidc-rp")]
#[command(about = "OpenID Connect relying party: sign in and out from a terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config profile name
    #[arg(short, long, global = true, env = "OIDC_RP_PROFILE", default_value = "default")]
    pub profile: String,

    /// Settings file (overrides the profile and OIDC_RP_SETTINGS env var)
    #[arg(short, long, global = true, env = "OIDC_RP_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Log protocol details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a sign-in and print the authorization URL
    Login(LoginArgs),
    /// Complete a sign-in from the callback URL
    Callback(UrlArgs),
    /// Sign out and print the end session URL
    Logout(LogoutArgs),
    /// Complete a sign-out from the post-logout redirect URL
    LogoutCallback(UrlArgs),
    /// Show the signed-in user
    Whoami,
    /// Show the provider endpoints
    Discover,
    /// Decode a JWT without verifying it
    Inspect(InspectArgs),
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Interaction {
    /// Full page redirect
    Redirect,
    /// Popup window
    Popup,
}

impl From<Interaction> for InteractionType {
    fn from(value: Interaction) -> Self {
        match value {
            Interaction::Redirect => InteractionType::Redirect,
            Interaction::Popup => InteractionType::Popup,
        }
    }
}

#[derive(clap::Args)]
pub struct LoginArgs {
    /// Interaction type (defaults to the settings)
    #[arg(long)]
    pub interaction: Option<Interaction>,
    /// Login hint sent to the provider
    #[arg(long)]
    pub login_hint: Option<String>,
    /// Scope (defaults to the settings)
    #[arg(long)]
    pub scope: Option<String>,
    /// Extra authorization parameters as key=value pairs
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
    /// Data returned on completion as key=value pairs
    #[arg(long = "data", value_name = "KEY=VALUE")]
    pub data: Vec<String>,
}

#[derive(clap::Args)]
pub struct LogoutArgs {
    /// Interaction type (defaults to the settings)
    #[arg(long)]
    pub interaction: Option<Interaction>,
    /// Where the provider sends the browser afterwards
    #[arg(long)]
    pub post_logout_redirect_uri: Option<String>,
    /// Data returned on completion as key=value pairs
    #[arg(long = "data", value_name = "KEY=VALUE")]
    pub data: Vec<String>,
}

#[derive(clap::Args)]
pub struct UrlArgs {
    /// The full URL the provider redirected to
    pub url: String,
}

#[derive(clap::Args)]
pub struct InspectArgs {
    /// Compact JWT
    pub token: String,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current config
    Show,
    /// Set config value
    Set(ConfigSetArgs),
}

#[derive(clap::Args)]
pub struct ConfigSetArgs {
    /// Key to set (settings, state)
    pub key: String,
    /// Value
    pub value: String,
}
