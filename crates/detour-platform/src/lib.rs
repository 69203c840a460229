//! # Detour Platform Adapters
//!
//! Implementations of the `detour-core` ports:
//!
//! - [`FileStore`] - JSON-file-backed settings store with mtime-based change
//!   polling
//! - [`MemoryStore`] - in-memory settings store for tests and embeddings
//! - [`MemoryHost`] - in-process navigation host that evaluates URLs against
//!   registered filters
//!
//! A browser-embedding or proxy front end would provide its own
//! `NavigationHost`; everything in this crate is host-independent Rust.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub use error::{PlatformError, Result};

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::{MemoryHost, MemoryStore};
