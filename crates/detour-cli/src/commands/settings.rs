//! Settings management commands
//!
//! The options surface: shows and edits the two stored settings, writing
//! through the same store the run loop watches.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use detour_core::pattern::entry_to_pattern;
use detour_core::ports::SettingsStore;
use detour_core::settings::{
    self, entries_to_text, text_to_entries, RawSettings, Settings, DEFAULT_REDIRECT_TARGET,
    KEY_BLOCKED_ENTRIES, KEY_REDIRECT_TARGET,
};
use detour_core::{entries_to_patterns, Config};
use detour_platform::FileStore;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::args::Args as GlobalArgs;
use crate::commands::{open_store, settings_path};

/// Settings management arguments
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommands,
}

/// Settings subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommands {
    /// Show the stored settings and derived match patterns
    Show,

    /// List blocklist entries with the pattern each derives
    List,

    /// Set the redirect target URL (empty resets to the built-in default)
    SetTarget {
        /// Destination URL
        url: String,
    },

    /// Add an entry to the blocklist
    Add {
        /// Domain, URL, or wildcard pattern
        entry: String,
    },

    /// Remove an entry from the blocklist
    Remove {
        /// Entry to remove (exact match after trimming)
        entry: String,
    },

    /// Replace the blocklist with entries from a text file
    /// (newline- or comma-separated)
    Import {
        /// Text file to read
        file: PathBuf,
    },

    /// Reset all settings to their defaults
    Reset,
}

/// Execute a settings command
pub async fn execute(args: SettingsArgs, common: &GlobalArgs, config: &Config) -> Result<()> {
    let store = open_store(common, config)?;

    match args.command {
        SettingsCommands::Show => show(&store, common, config).await,
        SettingsCommands::List => list(&store).await,
        SettingsCommands::SetTarget { url } => set_target(&store, &url).await,
        SettingsCommands::Add { entry } => add(&store, &entry).await,
        SettingsCommands::Remove { entry } => remove(&store, &entry).await,
        SettingsCommands::Import { file } => import(&store, &file).await,
        SettingsCommands::Reset => reset(&store).await,
    }
}

async fn read_settings(store: &FileStore) -> Result<Settings> {
    let stored = store.get(&Settings::default_values()).await?;
    Ok(Settings::from_stored(&stored))
}

async fn show(store: &FileStore, common: &GlobalArgs, config: &Config) -> Result<()> {
    let settings = read_settings(store).await?;
    let patterns = entries_to_patterns(&settings.blocked_entries);

    println!("{}", "═".repeat(50).bright_blue());
    println!("{}", " Detour Settings".bright_white().bold());
    println!("{}", "═".repeat(50).bright_blue());
    println!(
        "File: {}",
        settings_path(common, config).display().to_string().cyan()
    );
    println!("Redirect target: {}", settings.redirect_target.green());
    println!(
        "Blocked entries: {}  (patterns: {})",
        settings.blocked_entries.len().to_string().green(),
        patterns.len().to_string().green()
    );
    if !settings.blocked_entries.is_empty() {
        println!();
        println!("{}", entries_to_text(&settings.blocked_entries));
    }
    Ok(())
}

async fn list(store: &FileStore) -> Result<()> {
    let settings = read_settings(store).await?;
    if settings.blocked_entries.is_empty() {
        println!("{}", "Blocklist is empty. Add entries with 'settings add'".yellow());
        return Ok(());
    }

    for entry in &settings.blocked_entries {
        let Some(text) = entry.as_str().map(str::trim).filter(|t| !t.is_empty()) else {
            println!("{}  {}", entry.to_string().dimmed(), "(ignored)".yellow());
            continue;
        };
        match entry_to_pattern(text) {
            Some(pattern) => println!("{}  ->  {}", text, pattern.to_string().cyan()),
            None => println!("{}  {}", text.dimmed(), "(ignored)".yellow()),
        }
    }
    Ok(())
}

async fn set_target(store: &FileStore, url: &str) -> Result<()> {
    // Empty input resets to the default, as the options form does
    let target = some_or_default(url);
    store
        .set(RawSettings::from_iter([(
            KEY_REDIRECT_TARGET.to_string(),
            json!(target),
        )]))
        .await?;
    println!("Redirect target set to {}", target.green());
    Ok(())
}

fn some_or_default(url: &str) -> &str {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        DEFAULT_REDIRECT_TARGET
    } else {
        trimmed
    }
}

async fn add(store: &FileStore, entry: &str) -> Result<()> {
    let entry = entry.trim();
    if entry.is_empty() {
        println!("{}", "Nothing to add".yellow());
        return Ok(());
    }

    let mut entries = read_settings(store).await?.blocked_entries;
    if contains_entry(&entries, entry) {
        println!("{} is already blocked", entry.cyan());
        return Ok(());
    }

    entries.push(json!(entry));
    write_entries(store, entries).await?;
    println!("Blocked {}", entry.green());
    Ok(())
}

async fn remove(store: &FileStore, entry: &str) -> Result<()> {
    let entry = entry.trim();
    let mut entries = read_settings(store).await?.blocked_entries;
    let before = entries.len();
    entries.retain(|existing| existing.as_str().map(str::trim) != Some(entry));

    if entries.len() == before {
        println!("{} was not in the blocklist", entry.yellow());
        return Ok(());
    }

    write_entries(store, entries).await?;
    println!("Unblocked {}", entry.green());
    Ok(())
}

async fn import(store: &FileStore, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let entries: Vec<Value> = text_to_entries(&text).into_iter().map(Value::String).collect();
    let count = entries.len();

    write_entries(store, entries).await?;
    println!("Imported {} entries", count.to_string().green());
    Ok(())
}

async fn reset(store: &FileStore) -> Result<()> {
    store
        .set(RawSettings::from_iter([
            (KEY_REDIRECT_TARGET.to_string(), json!(DEFAULT_REDIRECT_TARGET)),
            (KEY_BLOCKED_ENTRIES.to_string(), json!([])),
            (settings::KEY_BLOCKED_URLS.to_string(), json!([])),
        ]))
        .await?;
    println!("{}", "Settings reset to defaults".green());
    Ok(())
}

async fn write_entries(store: &FileStore, entries: Vec<Value>) -> Result<()> {
    // Always writes the current key; legacy blockedUrls is read-only
    store
        .set(RawSettings::from_iter([(
            KEY_BLOCKED_ENTRIES.to_string(),
            Value::Array(entries),
        )]))
        .await?;
    Ok(())
}

fn contains_entry(entries: &[Value], entry: &str) -> bool {
    entries
        .iter()
        .any(|existing| existing.as_str().map(str::trim) == Some(entry))
}
