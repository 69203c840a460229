//! Detour CLI
//!
//! Command-line interface for the navigation redirector.

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Application config feeds logging defaults, so load it first
    let config = commands::load_config(&args)?;

    // Initialize logging
    logging::init(&args, &config.logging)?;

    // Run the main logic
    let result = run(args, config).await;

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}

async fn run(args: Args, config: detour_core::Config) -> Result<()> {
    match &args.command {
        Some(commands::Command::Run(run_args)) => {
            commands::run::execute(run_args.clone(), &args, &config).await
        }
        Some(commands::Command::Settings(settings_args)) => {
            commands::settings::execute(settings_args.clone(), &args, &config).await
        }
        Some(commands::Command::Check(check_args)) => {
            commands::check::execute(check_args.clone(), &args, &config).await
        }
        None => {
            // Default: run the redirect service
            commands::run::execute(commands::run::RunArgs::default(), &args, &config).await
        }
    }
}
