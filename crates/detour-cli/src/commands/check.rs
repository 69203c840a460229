//! Check command - one-shot URL evaluation

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use detour_core::ports::RequestKind;
use detour_core::{Config, RedirectController};
use detour_platform::MemoryHost;
use std::sync::Arc;
use url::Url;

use crate::args::Args as GlobalArgs;
use crate::commands::open_store;

/// Check command arguments
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// URL to evaluate (bare domains are tried as https://)
    pub url: String,
}

/// Execute the check command
pub async fn execute(args: CheckArgs, common: &GlobalArgs, config: &Config) -> Result<()> {
    let url = parse_url(&args.url)?;

    let store = Arc::new(open_store(common, config)?);
    let host = Arc::new(MemoryHost::new());
    let mut controller = RedirectController::new(store, host.clone());
    controller.load_settings().await?;

    match host.navigate(&url, RequestKind::MainFrame) {
        Some(redirect) => {
            println!(
                "{} {} -> {}",
                "REDIRECT".red().bold(),
                url,
                redirect.redirect_url.green()
            );
        }
        None => {
            println!("{} {}", "PASS".green().bold(), url);
        }
    }
    Ok(())
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("https://{raw}")))
        .with_context(|| format!("Invalid URL: {raw}"))
}
