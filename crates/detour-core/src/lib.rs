//! # Detour Core
//!
//! Host-independent core library for the Detour navigation redirector.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Pattern normalization** - Free-text blocklist entries to host match patterns
//! - **Settings model** - Persisted settings, change deltas, text conversion
//! - **Redirect controller** - Keeps the interception listener in sync with settings
//! - **Ports** - Traits for the settings store and navigation host
//! - **Configuration** - TOML application config
//!
//! ## Example
//!
//! ```rust,ignore
//! use detour_core::RedirectController;
//! use detour_platform::{FileStore, MemoryHost};
//! use std::sync::Arc;
//!
//! let store = Arc::new(FileStore::open("settings.json")?);
//! let host = Arc::new(MemoryHost::new());
//!
//! let mut controller = RedirectController::new(store, host);
//! controller.load_settings().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod controller;
pub mod error;
pub mod pattern;
pub mod ports;
pub mod settings;

// Re-exports for convenience
pub use config::Config;
pub use controller::RedirectController;
pub use error::{Error, Result};
pub use pattern::{entries_to_patterns, MatchPattern};
pub use settings::{Settings, SettingsArea, SettingsDelta};
