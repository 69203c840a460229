//! Run command - foreground redirect service
//!
//! The event loop behind `detour run`: load settings, then keep the
//! controller in sync with the settings file until interrupted.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use detour_core::ports::SettingsStore;
use detour_core::settings::{self, RawSettings, DEFAULT_REDIRECT_TARGET};
use detour_core::{Config, RedirectController};
use detour_platform::MemoryHost;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::args::Args as GlobalArgs;
use crate::commands::open_store;

/// Run command arguments
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Poll interval for settings-file changes, in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,
}

/// Execute the run command
pub async fn execute(args: RunArgs, common: &GlobalArgs, config: &Config) -> Result<()> {
    if !common.quiet {
        print_banner();
    }

    let store = Arc::new(open_store(common, config)?);

    if config.general.seed_settings_on_first_run {
        // First-run seeding is cosmetic; a failure must not stop the service
        match store.ensure_initialized(&seed_values()).await {
            Ok(true) => println!(
                "Created settings file at {}",
                store.path().display().to_string().cyan()
            ),
            Ok(false) => {}
            Err(err) => warn!("could not seed settings file: {err}"),
        }
    }

    let host = Arc::new(MemoryHost::new());
    let mut controller = RedirectController::new(store.clone(), host.clone());
    let mut changes = store.subscribe();

    controller.load_settings().await?;
    info!(
        target = %controller.redirect_target(),
        patterns = controller.blocked_patterns().len(),
        registered = controller.is_registered(),
        "settings loaded"
    );

    let poll_interval = args
        .poll_interval_ms
        .unwrap_or(config.storage.poll_interval_ms)
        .max(1);
    let mut ticker = tokio::time::interval(Duration::from_millis(poll_interval));
    info!(path = %store.path().display(), "watching settings for changes (ctrl-c to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = store.poll_changes().await {
                    // Next tick retries; reconciliation is driven by deltas
                    warn!("settings poll failed: {err}");
                }
            }
            delta = changes.recv() => match delta {
                Ok(delta) => {
                    if let Err(err) = controller.apply_delta(&delta) {
                        warn!("failed to apply settings change: {err}");
                    } else {
                        info!(
                            target = %controller.redirect_target(),
                            patterns = controller.blocked_patterns().len(),
                            registered = controller.is_registered(),
                            "settings change applied"
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed settings changes, reloading");
                    if let Err(err) = controller.load_settings().await {
                        // The next change event retries reconciliation
                        warn!("settings reload failed: {err}");
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    Ok(())
}

/// Initial settings written on first run.
fn seed_values() -> RawSettings {
    let mut values = RawSettings::new();
    values.insert(
        settings::KEY_REDIRECT_TARGET.to_string(),
        json!(DEFAULT_REDIRECT_TARGET),
    );
    values.insert(settings::KEY_BLOCKED_ENTRIES.to_string(), json!([]));
    values
}

fn print_banner() {
    println!();
    println!("  {}", "Detour".green().bold());
    println!("  {}", "Navigation redirector".white());
    println!();
}
