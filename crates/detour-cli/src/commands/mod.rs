//! CLI subcommands and shared wiring

pub mod check;
pub mod run;
pub mod settings;

use crate::args::Args;
use anyhow::{Context, Result};
use clap::Subcommand;
use detour_core::Config;
use detour_platform::FileStore;
use directories::ProjectDirs;
use std::path::PathBuf;

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the redirect service in the foreground
    Run(run::RunArgs),

    /// Inspect and edit the stored settings
    Settings(settings::SettingsArgs),

    /// Evaluate a URL against the current blocklist
    Check(check::CheckArgs),
}

/// Load the application config: the explicit path, else the default
/// location when a file exists there, else built-in defaults.
pub fn load_config(args: &Args) -> Result<Config> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => default_config_path().filter(|path| path.exists()),
    };

    let config = match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Resolve the settings file location: CLI flag, then config file, then the
/// platform config directory.
pub fn settings_path(args: &Args, config: &Config) -> PathBuf {
    if let Some(path) = &args.settings {
        return path.clone();
    }
    if let Some(path) = &config.storage.path {
        return path.clone();
    }
    default_settings_path()
}

/// Open the file-backed settings store.
pub fn open_store(args: &Args, config: &Config) -> Result<FileStore> {
    let path = settings_path(args, config);
    FileStore::open(&path)
        .with_context(|| format!("Failed to open settings file {}", path.display()))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "detour")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_settings_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("settings.json"))
        .unwrap_or_else(|| PathBuf::from("settings.json"))
}
