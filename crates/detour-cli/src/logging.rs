//! Logging initialization

use anyhow::{Context, Result};
use detour_core::config::LoggingConfig;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::{Args, LogFormat};

/// Initialize logging from CLI arguments, with the config file supplying
/// defaults for level, format, and log file.
pub fn init(args: &Args, config: &LoggingConfig) -> Result<()> {
    // Determine log level: flags beat the configured level
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => config.level.parse().unwrap_or(Level::INFO),
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    // Build env filter
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let format = args.log_format.unwrap_or(if config.json_format {
        LogFormat::Json
    } else {
        LogFormat::Text
    });
    let log_file = args
        .log_file
        .clone()
        .or_else(|| config.file.as_ref().map(PathBuf::from));

    // Set up subscriber based on format
    match format {
        LogFormat::Text => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .with_target(args.verbose >= 2)
                    .with_file(args.verbose >= 2)
                    .with_line_number(args.verbose >= 2),
            );

            if let Some(ref path) = log_file {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Failed to create log file: {}", path.display()))?;
                let file_layer = fmt::layer().with_ansi(false).with_writer(file);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json());

            if let Some(ref path) = log_file {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Failed to create log file: {}", path.display()))?;
                let file_layer = fmt::layer().json().with_writer(file);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact());
            subscriber.init();
        }
    }

    Ok(())
}
