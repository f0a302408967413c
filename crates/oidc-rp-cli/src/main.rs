mod browser;
mod cli;
mod commands;
mod config;
mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use oidc_rp::config::loader::load_settings;
use oidc_rp::observability::{apply_logging_level, init_tracing_with_level};
use oidc_rp::{FileStorage, UserManager};

use browser::ConsoleBrowser;
use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(if cli.verbose { "debug" } else { "error" });
    let profile = &cli.profile;

    match &cli.command {
        Commands::Login(args) => {
            let manager = make_manager(&cli)?;
            commands::auth::login(&manager, args).await?;
        }
        Commands::Callback(args) => {
            let manager = make_manager(&cli)?;
            commands::auth::callback(&manager, &args.url).await?;
        }
        Commands::Logout(args) => {
            let manager = make_manager(&cli)?;
            commands::auth::logout(&manager, args).await?;
        }
        Commands::LogoutCallback(args) => {
            let manager = make_manager(&cli)?;
            commands::auth::logout_callback(&manager, &args.url).await?;
        }
        Commands::Whoami => {
            let manager = make_manager(&cli)?;
            commands::auth::whoami(&manager, profile).await?;
        }
        Commands::Discover => {
            let manager = make_manager(&cli)?;
            commands::provider::discover(&manager).await?;
        }
        Commands::Inspect(args) => {
            commands::provider::inspect(&args.token)?;
        }
        Commands::Config(args) => match &args.command {
            cli::ConfigCommands::Show => {
                let cfg = config::load_profile(profile)?;
                println!("{}: {}", "Profile".cyan(), profile);
                println!(
                    "{}: {}",
                    "Settings".cyan(),
                    cfg.settings.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "{}: {}",
                    "State".cyan(),
                    config::resolve_state(profile)?.display()
                );
            }
            cli::ConfigCommands::Set(set_args) => {
                let mut cfg = config::load_profile(profile)?;
                config::set_key(&mut cfg, &set_args.key, &set_args.value)?;
                config::save_profile(profile, &cfg)?;
                output::print_success(&format!("Set {} = {}", set_args.key, set_args.value));
            }
        },
    }

    Ok(())
}

fn make_manager(cli: &Cli) -> Result<UserManager> {
    let settings_path = config::resolve_settings(&cli.settings, &cli.profile)?;
    let settings = load_settings(settings_path.as_deref()).context("Failed to load settings")?;
    if !cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        apply_logging_level(&settings.log_level);
    }

    let state_path = config::resolve_state(&cli.profile)?;
    tracing::debug!("Protocol state kept in {}", state_path.display());

    UserManager::builder(
        settings,
        Arc::new(FileStorage::new(state_path)),
        Arc::new(ConsoleBrowser),
    )
    .build()
    .context("Invalid settings")
}
