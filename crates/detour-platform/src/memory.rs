//! In-memory adapters
//!
//! `MemoryStore` and `MemoryHost` back the test suites and embeddings that
//! bring their own event loop. `MemoryHost` is also the evaluation engine
//! behind one-shot URL checks: it dispatches a navigation through whatever
//! listeners are registered and returns the first redirect decision.

use dashmap::DashMap;
use detour_core::error::Result as CoreResult;
use detour_core::ports::{
    NavigationFilter, NavigationHost, NavigationRequest, Redirect, RedirectDecider,
    RegistrationHandle, RequestKind, SettingsStore,
};
use detour_core::settings::{RawSettings, SettingsDelta};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::trace;
use url::Url;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// In-memory settings store with change notifications.
pub struct MemoryStore {
    values: RwLock<RawSettings>,
    changes: broadcast::Sender<SettingsDelta>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_values(RawSettings::new())
    }

    /// Create a store seeded with the given values.
    pub fn with_values(values: RawSettings) -> Self {
        Self {
            values: RwLock::new(values),
            changes: broadcast::channel(CHANGE_CHANNEL_CAPACITY).0,
        }
    }

    /// Snapshot of everything currently stored.
    pub fn snapshot(&self) -> RawSettings {
        self.values.read().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, defaults: &RawSettings) -> CoreResult<RawSettings> {
        let stored = self.values.read();
        let mut result = defaults.clone();
        for (key, value) in result.iter_mut() {
            if let Some(stored_value) = stored.get(key) {
                *value = stored_value.clone();
            }
        }
        Ok(result)
    }

    async fn set(&self, values: RawSettings) -> CoreResult<()> {
        let delta = {
            let mut stored = self.values.write();
            let old = stored.clone();
            stored.extend(values);
            SettingsDelta::between(&old, &stored)
        };
        if !delta.is_empty() {
            // Nobody listening is fine
            let _ = self.changes.send(delta);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsDelta> {
        self.changes.subscribe()
    }
}

struct Registration {
    filter: NavigationFilter,
    decider: RedirectDecider,
}

/// In-process navigation host.
///
/// Keeps a registry of active listener registrations and dispatches
/// navigations through them synchronously.
pub struct MemoryHost {
    next_id: AtomicU64,
    registrations: DashMap<u64, Registration>,
}

impl MemoryHost {
    /// Create a host with no registrations.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            registrations: DashMap::new(),
        }
    }

    /// Number of currently active registrations.
    pub fn active_registrations(&self) -> usize {
        self.registrations.len()
    }

    /// Dispatch a navigation through the registered listeners.
    ///
    /// Listeners whose filter covers the URL and request kind are consulted
    /// in arbitrary order; the first redirect decision wins. `None` means the
    /// navigation proceeds untouched.
    pub fn navigate(&self, url: &Url, kind: RequestKind) -> Option<Redirect> {
        let request = NavigationRequest {
            url: url.clone(),
            kind,
        };
        for entry in self.registrations.iter() {
            let registration = entry.value();
            if !registration.filter.kinds.contains(&kind) {
                continue;
            }
            if !registration
                .filter
                .patterns
                .iter()
                .any(|pattern| pattern.matches(url))
            {
                continue;
            }
            if let Some(redirect) = (registration.decider)(&request) {
                trace!(url = %url, to = %redirect.redirect_url, "navigation redirected");
                return Some(redirect);
            }
        }
        None
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationHost for MemoryHost {
    fn register(
        &self,
        filter: NavigationFilter,
        decider: RedirectDecider,
    ) -> CoreResult<RegistrationHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.registrations.insert(id, Registration { filter, decider });
        Ok(RegistrationHandle::new(id))
    }

    fn unregister(&self, handle: RegistrationHandle) -> CoreResult<()> {
        self.registrations.remove(&handle.id());
        Ok(())
    }
}
