use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProfileConfig {
    /// Settings file for this profile.
    pub settings: Option<String>,
    /// Where protocol state is kept between invocations.
    pub state: Option<String>,
}

pub type ConfigFile = HashMap<String, ProfileConfig>;

fn config_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".oidc-rp");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

fn load_all_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::new());
    }
    let content = fs::read_to_string(path)?;
    let cfg: ConfigFile =
        toml::from_str(&content).with_context(|| format!("Invalid {}", path.display()))?;
    Ok(cfg)
}

fn save_profile_to(path: &Path, profile: &str, config: &ProfileConfig) -> Result<()> {
    let mut all = load_all_from(path)?;
    all.insert(profile.to_string(), config.clone());
    let content = toml::to_string_pretty(&all)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_profile(profile: &str) -> Result<ProfileConfig> {
    let all = load_all_from(&config_path()?)?;
    Ok(all.get(profile).cloned().unwrap_or_default())
}

pub fn save_profile(profile: &str, config: &ProfileConfig) -> Result<()> {
    save_profile_to(&config_path()?, profile, config)
}

pub fn set_key(config: &mut ProfileConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "settings" => config.settings = Some(value.to_string()),
        "state" => config.state = Some(value.to_string()),
        other => anyhow::bail!("Unknown config key: {other}. Valid keys: settings, state"),
    }
    Ok(())
}

pub fn resolve_settings(cli_settings: &Option<PathBuf>, profile: &str) -> Result<Option<PathBuf>> {
    // 1. --settings flag / OIDC_RP_SETTINGS env
    if let Some(path) = cli_settings {
        return Ok(Some(path.clone()));
    }
    // 2. config.toml profile; otherwise settings come from OIDC_RP__* variables only
    Ok(load_profile(profile)?.settings.map(PathBuf::from))
}

pub fn resolve_state(profile: &str) -> Result<PathBuf> {
    if let Some(state) = load_profile(profile)?.state {
        return Ok(PathBuf::from(state));
    }
    Ok(config_dir()?.join("state").join(format!("{profile}.json")))
}
