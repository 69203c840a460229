//! Redirect controller
//!
//! Owns the in-memory redirect target and compiled pattern list, and keeps
//! a single navigation-listener registration in sync with stored settings.

use crate::error::Result;
use crate::pattern::{entries_to_patterns, MatchPattern};
use crate::ports::{
    NavigationFilter, NavigationHost, Redirect, RedirectDecider, RegistrationHandle,
    SettingsStore,
};
use crate::settings::{KeyChange, Settings, SettingsArea, SettingsDelta, DEFAULT_REDIRECT_TARGET};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Controller reconciling stored settings with the navigation host.
///
/// Listener lifecycle is a two-state machine: **Unregistered** and
/// **Registered** over the current pattern set. Every settings load or delta
/// recomputes the inputs and runs [`sync_listener`](Self::sync_listener);
/// there are no other transitions. The initial state is Unregistered until
/// the first [`load_settings`](Self::load_settings) completes.
pub struct RedirectController {
    store: Arc<dyn SettingsStore>,
    host: Arc<dyn NavigationHost>,
    /// Shared with the registered decider, so target changes are observed
    /// without re-registration.
    redirect_target: Arc<RwLock<String>>,
    blocked_patterns: Vec<MatchPattern>,
    registration: Option<RegistrationHandle>,
}

impl RedirectController {
    /// Create a controller in the Unregistered state with the built-in
    /// default target and an empty blocklist.
    pub fn new(store: Arc<dyn SettingsStore>, host: Arc<dyn NavigationHost>) -> Self {
        Self {
            store,
            host,
            redirect_target: Arc::new(RwLock::new(DEFAULT_REDIRECT_TARGET.to_string())),
            blocked_patterns: Vec::new(),
            registration: None,
        }
    }

    /// Read persisted settings (default-filled), recompute the pattern set
    /// and redirect target, and reconcile the listener.
    ///
    /// Concurrent calls are not synchronized; the run loop dispatches one
    /// settings-mutating operation at a time and a racing delta reconverges
    /// on the next change event.
    pub async fn load_settings(&mut self) -> Result<()> {
        let stored = self.store.get(&Settings::default_values()).await?;
        let settings = Settings::from_stored(&stored);

        *self.redirect_target.write() = settings.redirect_target;
        self.blocked_patterns = entries_to_patterns(&settings.blocked_entries);

        self.sync_listener()
    }

    /// React to a settings-change notification. Notifications outside the
    /// local area are ignored.
    pub fn apply_delta(&mut self, delta: &SettingsDelta) -> Result<()> {
        if delta.area != SettingsArea::Local {
            debug!(area = ?delta.area, "ignoring settings change outside local area");
            return Ok(());
        }

        if let Some(change) = &delta.redirect_target {
            let target = change
                .new_value
                .as_ref()
                .and_then(Value::as_str)
                .filter(|target| !target.is_empty())
                .unwrap_or(DEFAULT_REDIRECT_TARGET);
            *self.redirect_target.write() = target.to_string();
        }

        // A change to the current key wins over a simultaneous legacy-key
        // change
        if let Some(change) = &delta.blocked_entries {
            self.blocked_patterns = patterns_from_change(change);
        } else if let Some(change) = &delta.blocked_urls {
            self.blocked_patterns = patterns_from_change(change);
        }

        self.sync_listener()
    }

    /// Idempotent reconciliation of the listener registration.
    ///
    /// Any held registration is removed first; a fresh callback scoped to
    /// exactly the current pattern set and top-level loads is registered when
    /// the set is non-empty. An empty set leaves the listener unregistered.
    pub fn sync_listener(&mut self) -> Result<()> {
        if let Some(handle) = self.registration.take() {
            self.host.unregister(handle)?;
        }

        if self.blocked_patterns.is_empty() {
            debug!("blocklist empty, navigation listener left unregistered");
            return Ok(());
        }

        let filter = NavigationFilter::main_frame(self.blocked_patterns.clone());
        let handle = self.host.register(filter, self.decider())?;
        self.registration = Some(handle);
        info!(
            patterns = self.blocked_patterns.len(),
            "navigation listener registered"
        );
        Ok(())
    }

    /// The interception callback: a pure synchronous read of the current
    /// redirect target. Never fails and never blocks.
    fn decider(&self) -> RedirectDecider {
        let target = Arc::clone(&self.redirect_target);
        Arc::new(move |_request: &crate::ports::NavigationRequest| {
            Some(Redirect {
                redirect_url: target.read().clone(),
            })
        })
    }

    /// The currently active redirect target.
    pub fn redirect_target(&self) -> String {
        self.redirect_target.read().clone()
    }

    /// The compiled pattern set driving the interception filter.
    pub fn blocked_patterns(&self) -> &[MatchPattern] {
        &self.blocked_patterns
    }

    /// Whether an interception callback is currently registered.
    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }
}

fn patterns_from_change(change: &KeyChange) -> Vec<MatchPattern> {
    change
        .new_value
        .as_ref()
        .and_then(Value::as_array)
        .map(|entries| entries_to_patterns(entries))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{RawSettings, KEY_BLOCKED_ENTRIES, KEY_REDIRECT_TARGET};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::broadcast;

    // In-file fakes for the two ports

    struct FakeStore {
        values: Mutex<RawSettings>,
        changes: broadcast::Sender<SettingsDelta>,
    }

    impl FakeStore {
        fn with_values(values: RawSettings) -> Arc<Self> {
            Arc::new(Self {
                values: Mutex::new(values),
                changes: broadcast::channel(16).0,
            })
        }
    }

    #[async_trait::async_trait]
    impl SettingsStore for FakeStore {
        async fn get(&self, defaults: &RawSettings) -> Result<RawSettings> {
            let stored = self.values.lock();
            let mut result = defaults.clone();
            for (key, value) in result.iter_mut() {
                if let Some(v) = stored.get(key) {
                    *value = v.clone();
                }
            }
            Ok(result)
        }

        async fn set(&self, values: RawSettings) -> Result<()> {
            self.values.lock().extend(values);
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<SettingsDelta> {
            self.changes.subscribe()
        }
    }

    #[derive(Default)]
    struct FakeHost {
        next_id: AtomicU64,
        active: Mutex<HashMap<u64, (NavigationFilter, RedirectDecider)>>,
    }

    impl FakeHost {
        fn active_count(&self) -> usize {
            self.active.lock().len()
        }

        fn active_filter(&self) -> Option<NavigationFilter> {
            self.active.lock().values().next().map(|(f, _)| f.clone())
        }

        fn decide(&self, url: &str) -> Option<Redirect> {
            let request = crate::ports::NavigationRequest {
                url: url::Url::parse(url).unwrap(),
                kind: crate::ports::RequestKind::MainFrame,
            };
            let active = self.active.lock();
            let (_, decider) = active.values().next()?;
            decider(&request)
        }
    }

    impl NavigationHost for FakeHost {
        fn register(
            &self,
            filter: NavigationFilter,
            decider: RedirectDecider,
        ) -> Result<RegistrationHandle> {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            self.active.lock().insert(id, (filter, decider));
            Ok(RegistrationHandle::new(id))
        }

        fn unregister(&self, handle: RegistrationHandle) -> Result<()> {
            self.active.lock().remove(&handle.id());
            Ok(())
        }
    }

    fn stored(entries: Value, target: Option<&str>) -> RawSettings {
        let mut values = RawSettings::new();
        values.insert(KEY_BLOCKED_ENTRIES.to_string(), entries);
        if let Some(target) = target {
            values.insert(KEY_REDIRECT_TARGET.to_string(), json!(target));
        }
        values
    }

    #[tokio::test]
    async fn test_load_registers_listener() {
        let store = FakeStore::with_values(stored(json!(["example.com"]), None));
        let host = Arc::new(FakeHost::default());
        let mut controller = RedirectController::new(store, host.clone());

        assert!(!controller.is_registered());
        controller.load_settings().await.unwrap();

        assert!(controller.is_registered());
        assert_eq!(host.active_count(), 1);
        let filter = host.active_filter().unwrap();
        assert_eq!(filter.patterns, vec![MatchPattern::for_host("example.com")]);
        assert_eq!(filter.kinds, vec![crate::ports::RequestKind::MainFrame]);
    }

    #[tokio::test]
    async fn test_empty_blocklist_stays_unregistered() {
        let store = FakeStore::with_values(RawSettings::new());
        let host = Arc::new(FakeHost::default());
        let mut controller = RedirectController::new(store, host.clone());

        controller.load_settings().await.unwrap();

        assert!(!controller.is_registered());
        assert_eq!(host.active_count(), 0);
        assert_eq!(controller.redirect_target(), DEFAULT_REDIRECT_TARGET);
    }

    #[tokio::test]
    async fn test_sync_listener_idempotent() {
        let store = FakeStore::with_values(stored(json!(["example.com"]), None));
        let host = Arc::new(FakeHost::default());
        let mut controller = RedirectController::new(store, host.clone());
        controller.load_settings().await.unwrap();

        controller.sync_listener().unwrap();
        controller.sync_listener().unwrap();

        assert_eq!(host.active_count(), 1);
    }

    #[tokio::test]
    async fn test_target_only_delta_keeps_patterns() {
        let store = FakeStore::with_values(stored(json!(["example.com"]), None));
        let host = Arc::new(FakeHost::default());
        let mut controller = RedirectController::new(store, host.clone());
        controller.load_settings().await.unwrap();

        let before = host.active_filter().unwrap().patterns;

        let delta = SettingsDelta {
            redirect_target: Some(KeyChange {
                old_value: None,
                new_value: Some(json!("https://elsewhere.example/")),
            }),
            ..Default::default()
        };
        controller.apply_delta(&delta).unwrap();

        assert_eq!(host.active_count(), 1);
        assert_eq!(host.active_filter().unwrap().patterns, before);
        assert_eq!(controller.redirect_target(), "https://elsewhere.example/");
        assert_eq!(
            host.decide("https://example.com/").unwrap().redirect_url,
            "https://elsewhere.example/"
        );
    }

    #[tokio::test]
    async fn test_target_delta_falls_back_to_default() {
        let store = FakeStore::with_values(stored(json!(["example.com"]), Some("https://x.example/")));
        let host = Arc::new(FakeHost::default());
        let mut controller = RedirectController::new(store, host.clone());
        controller.load_settings().await.unwrap();
        assert_eq!(controller.redirect_target(), "https://x.example/");

        let delta = SettingsDelta {
            redirect_target: Some(KeyChange {
                old_value: Some(json!("https://x.example/")),
                new_value: Some(json!("")),
            }),
            ..Default::default()
        };
        controller.apply_delta(&delta).unwrap();
        assert_eq!(controller.redirect_target(), DEFAULT_REDIRECT_TARGET);
    }

    #[tokio::test]
    async fn test_blocklist_delta_unregisters_when_cleared() {
        let store = FakeStore::with_values(stored(json!(["example.com"]), None));
        let host = Arc::new(FakeHost::default());
        let mut controller = RedirectController::new(store, host.clone());
        controller.load_settings().await.unwrap();
        assert!(controller.is_registered());

        let delta = SettingsDelta {
            blocked_entries: Some(KeyChange {
                old_value: Some(json!(["example.com"])),
                new_value: Some(json!([])),
            }),
            ..Default::default()
        };
        controller.apply_delta(&delta).unwrap();

        assert!(!controller.is_registered());
        assert_eq!(host.active_count(), 0);
    }

    #[tokio::test]
    async fn test_non_local_delta_ignored() {
        let store = FakeStore::with_values(stored(json!(["example.com"]), None));
        let host = Arc::new(FakeHost::default());
        let mut controller = RedirectController::new(store, host.clone());
        controller.load_settings().await.unwrap();

        let delta = SettingsDelta {
            area: SettingsArea::Sync,
            blocked_entries: Some(KeyChange {
                old_value: None,
                new_value: Some(json!([])),
            }),
            ..Default::default()
        };
        controller.apply_delta(&delta).unwrap();

        // Still registered with the original pattern set
        assert!(controller.is_registered());
        assert_eq!(host.active_count(), 1);
    }

    #[tokio::test]
    async fn test_legacy_key_delta_precedence() {
        let store = FakeStore::with_values(RawSettings::new());
        let host = Arc::new(FakeHost::default());
        let mut controller = RedirectController::new(store, host.clone());
        controller.load_settings().await.unwrap();

        // Both keys change at once: the current key wins
        let delta = SettingsDelta {
            blocked_entries: Some(KeyChange {
                old_value: None,
                new_value: Some(json!(["new.com"])),
            }),
            blocked_urls: Some(KeyChange {
                old_value: None,
                new_value: Some(json!(["old.com"])),
            }),
            ..Default::default()
        };
        controller.apply_delta(&delta).unwrap();

        assert_eq!(
            controller.blocked_patterns(),
            &[MatchPattern::for_host("new.com")]
        );

        // Legacy key alone still applies
        let delta = SettingsDelta {
            blocked_urls: Some(KeyChange {
                old_value: Some(json!(["old.com"])),
                new_value: Some(json!(["legacy.com"])),
            }),
            ..Default::default()
        };
        controller.apply_delta(&delta).unwrap();
        assert_eq!(
            controller.blocked_patterns(),
            &[MatchPattern::for_host("legacy.com")]
        );
    }

    #[tokio::test]
    async fn test_blocklist_key_removed_clears_patterns() {
        let store = FakeStore::with_values(stored(json!(["example.com"]), None));
        let host = Arc::new(FakeHost::default());
        let mut controller = RedirectController::new(store, host.clone());
        controller.load_settings().await.unwrap();

        let delta = SettingsDelta {
            blocked_entries: Some(KeyChange {
                old_value: Some(json!(["example.com"])),
                new_value: None,
            }),
            ..Default::default()
        };
        controller.apply_delta(&delta).unwrap();
        assert!(!controller.is_registered());
    }
}
