//! Ports to the host environment
//!
//! The settings store and the navigation-interception API are external
//! collaborators. These traits define the interface implementations must
//! follow; adapters live in `detour-platform` and are injected at wiring
//! time.

use crate::error::Result;
use crate::pattern::MatchPattern;
use crate::settings::{RawSettings, SettingsDelta};
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

/// Persistent key-value settings store.
///
/// Reads are async (external storage); change notifications arrive on a
/// broadcast channel as [`SettingsDelta`] values scoped to a settings area.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    /// Default-filling read: every key present in `defaults` appears in the
    /// result, taking the stored value when one exists and the default
    /// otherwise.
    async fn get(&self, defaults: &RawSettings) -> Result<RawSettings>;

    /// Write the given keys; keys not mentioned are left untouched.
    async fn set(&self, values: RawSettings) -> Result<()>;

    /// Subscribe to change notifications for this store.
    fn subscribe(&self) -> broadcast::Receiver<SettingsDelta>;
}

/// Kinds of navigation requests a listener can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Top-level document load.
    MainFrame,
    /// Document load inside a frame.
    SubFrame,
}

/// An intercepted navigation request handed to a decider.
#[derive(Debug, Clone)]
pub struct NavigationRequest {
    /// The URL being navigated to.
    pub url: Url,
    /// What kind of load this is.
    pub kind: RequestKind,
}

/// Redirect instruction returned by a decider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Destination substituted for the matched navigation.
    pub redirect_url: String,
}

/// Scope of a listener registration: which patterns and request kinds the
/// callback should see.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationFilter {
    /// URL patterns the listener is notified about.
    pub patterns: Vec<MatchPattern>,
    /// Request kinds the listener is notified about.
    pub kinds: Vec<RequestKind>,
}

impl NavigationFilter {
    /// Filter scoped to top-level document loads of the given patterns.
    pub fn main_frame(patterns: Vec<MatchPattern>) -> Self {
        Self {
            patterns,
            kinds: vec![RequestKind::MainFrame],
        }
    }
}

/// Synchronous interception callback. The host blocks the navigation until
/// it returns, so it must be fast, must not block, and must not panic.
pub type RedirectDecider = Arc<dyn Fn(&NavigationRequest) -> Option<Redirect> + Send + Sync>;

/// Opaque token for an active listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(u64);

impl RegistrationHandle {
    /// Wrap a host-issued registration id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The host-issued registration id.
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Navigation interception host.
///
/// Registration is synchronous; at most one registration per controller is
/// held at a time, tracked by its [`RegistrationHandle`].
pub trait NavigationHost: Send + Sync {
    /// Register a blocking interception callback scoped by `filter`.
    fn register(&self, filter: NavigationFilter, decider: RedirectDecider)
        -> Result<RegistrationHandle>;

    /// Remove a previous registration. Unknown handles are a no-op.
    fn unregister(&self, handle: RegistrationHandle) -> Result<()>;
}
