//! Persisted settings model
//!
//! Settings live in an external key-value store as a JSON object. This module
//! provides the typed snapshot read from that store, the change-delta type
//! delivered by store notifications, and the text conversion used by the
//! options surface.

use serde_json::{json, Map, Value};

/// Storage key for the redirect target URL.
pub const KEY_REDIRECT_TARGET: &str = "redirectUrl";

/// Storage key for the blocklist entries.
pub const KEY_BLOCKED_ENTRIES: &str = "blockedEntries";

/// Legacy storage key for the blocklist, written by older versions.
/// Read-tolerated; `blockedEntries` wins whenever it holds an array.
pub const KEY_BLOCKED_URLS: &str = "blockedUrls";

/// Built-in redirect destination used when the stored target is absent or
/// empty.
pub const DEFAULT_REDIRECT_TARGET: &str =
    "https://breakfreefromaddictions.blogspot.com/p/addiction-free.html";

/// Raw settings as stored: a JSON object keyed by the `KEY_*` constants.
pub type RawSettings = Map<String, Value>;

/// Typed snapshot of the persisted settings after default-filling.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Destination substituted for matched navigations.
    pub redirect_target: String,
    /// Raw blocklist entries; only strings survive normalization.
    pub blocked_entries: Vec<Value>,
}

impl Settings {
    /// The default-filling read map handed to the settings store: target
    /// falls back to the built-in constant, the blocklist to empty.
    pub fn default_values() -> RawSettings {
        let mut defaults = RawSettings::new();
        defaults.insert(KEY_REDIRECT_TARGET.to_string(), json!(DEFAULT_REDIRECT_TARGET));
        defaults.insert(KEY_BLOCKED_ENTRIES.to_string(), Value::Null);
        defaults.insert(KEY_BLOCKED_URLS.to_string(), json!([]));
        defaults
    }

    /// Build a snapshot from raw stored values, applying the empty/absent
    /// target fallback and the legacy-key precedence.
    pub fn from_stored(values: &RawSettings) -> Self {
        let redirect_target = values
            .get(KEY_REDIRECT_TARGET)
            .and_then(Value::as_str)
            .filter(|target| !target.is_empty())
            .unwrap_or(DEFAULT_REDIRECT_TARGET)
            .to_string();

        let blocked_entries = match values.get(KEY_BLOCKED_ENTRIES) {
            Some(Value::Array(entries)) => entries.clone(),
            _ => values
                .get(KEY_BLOCKED_URLS)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        };

        Self {
            redirect_target,
            blocked_entries,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redirect_target: DEFAULT_REDIRECT_TARGET.to_string(),
            blocked_entries: Vec::new(),
        }
    }
}

/// A change to a single settings key, carrying the old and new values.
/// `None` means the key was absent on that side.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    /// Value before the change.
    pub old_value: Option<Value>,
    /// Value after the change.
    pub new_value: Option<Value>,
}

/// Named persistence scope a change originated from. The controller only
/// reacts to the local area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsArea {
    /// Local persistence area owned by this process.
    #[default]
    Local,
    /// Synchronized area (another device or profile).
    Sync,
    /// Administratively managed area.
    Managed,
}

/// Change notification carrying old/new values for changed keys only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsDelta {
    /// Persistence area the change originated from.
    pub area: SettingsArea,
    /// Redirect target change, if any.
    pub redirect_target: Option<KeyChange>,
    /// Blocklist change, if any.
    pub blocked_entries: Option<KeyChange>,
    /// Legacy-key blocklist change, if any.
    pub blocked_urls: Option<KeyChange>,
}

impl SettingsDelta {
    /// True when no tracked key changed.
    pub fn is_empty(&self) -> bool {
        self.redirect_target.is_none()
            && self.blocked_entries.is_none()
            && self.blocked_urls.is_none()
    }

    /// Diff two raw maps into a local-area delta covering the tracked keys.
    pub fn between(old: &RawSettings, new: &RawSettings) -> Self {
        Self {
            area: SettingsArea::Local,
            redirect_target: key_change(old, new, KEY_REDIRECT_TARGET),
            blocked_entries: key_change(old, new, KEY_BLOCKED_ENTRIES),
            blocked_urls: key_change(old, new, KEY_BLOCKED_URLS),
        }
    }
}

fn key_change(old: &RawSettings, new: &RawSettings, key: &str) -> Option<KeyChange> {
    let old_value = old.get(key);
    let new_value = new.get(key);
    if old_value == new_value {
        return None;
    }
    Some(KeyChange {
        old_value: old_value.cloned(),
        new_value: new_value.cloned(),
    })
}

/// Split the multi-line/comma text form used by the options surface into
/// trimmed entries, dropping empties.
pub fn text_to_entries(text: &str) -> Vec<String> {
    text.split(['\n', ','])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Join raw entries into the text form, one per line. Non-string entries are
/// rendered as JSON.
pub fn entries_to_text(entries: &[Value]) -> String {
    entries
        .iter()
        .map(|entry| match entry.as_str() {
            Some(s) => s.to_string(),
            None => entry.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // =========== Snapshot Tests ===========

    #[test]
    fn test_from_stored_defaults() {
        let settings = Settings::from_stored(&RawSettings::new());
        assert_eq!(settings.redirect_target, DEFAULT_REDIRECT_TARGET);
        assert!(settings.blocked_entries.is_empty());
    }

    #[test]
    fn test_empty_target_falls_back() {
        let mut values = RawSettings::new();
        values.insert(KEY_REDIRECT_TARGET.to_string(), json!(""));
        let settings = Settings::from_stored(&values);
        assert_eq!(settings.redirect_target, DEFAULT_REDIRECT_TARGET);

        values.insert(KEY_REDIRECT_TARGET.to_string(), Value::Null);
        let settings = Settings::from_stored(&values);
        assert_eq!(settings.redirect_target, DEFAULT_REDIRECT_TARGET);
    }

    #[test]
    fn test_legacy_key_precedence() {
        let mut values = RawSettings::new();
        values.insert(KEY_BLOCKED_URLS.to_string(), json!(["old.com"]));
        let settings = Settings::from_stored(&values);
        assert_eq!(settings.blocked_entries, vec![json!("old.com")]);

        // An array under the new key wins
        values.insert(KEY_BLOCKED_ENTRIES.to_string(), json!(["new.com"]));
        let settings = Settings::from_stored(&values);
        assert_eq!(settings.blocked_entries, vec![json!("new.com")]);

        // A non-array under the new key falls back to the legacy key
        values.insert(KEY_BLOCKED_ENTRIES.to_string(), Value::Null);
        let settings = Settings::from_stored(&values);
        assert_eq!(settings.blocked_entries, vec![json!("old.com")]);
    }

    // =========== Delta Tests ===========

    #[test]
    fn test_delta_between() {
        let mut old = RawSettings::new();
        old.insert(KEY_REDIRECT_TARGET.to_string(), json!("https://a.example/"));
        let mut new = old.clone();
        new.insert(KEY_REDIRECT_TARGET.to_string(), json!("https://b.example/"));
        new.insert(KEY_BLOCKED_ENTRIES.to_string(), json!(["x.com"]));

        let delta = SettingsDelta::between(&old, &new);
        assert_eq!(delta.area, SettingsArea::Local);
        let target = delta.redirect_target.unwrap();
        assert_eq!(target.old_value, Some(json!("https://a.example/")));
        assert_eq!(target.new_value, Some(json!("https://b.example/")));
        let entries = delta.blocked_entries.unwrap();
        assert_eq!(entries.old_value, None);
        assert_eq!(entries.new_value, Some(json!(["x.com"])));
        assert!(delta.blocked_urls.is_none());
    }

    #[test]
    fn test_delta_unchanged_is_empty() {
        let mut values = RawSettings::new();
        values.insert(KEY_BLOCKED_ENTRIES.to_string(), json!(["x.com"]));
        let delta = SettingsDelta::between(&values, &values.clone());
        assert!(delta.is_empty());
    }

    // =========== Text Conversion Tests ===========

    #[test]
    fn test_text_to_entries() {
        let entries = text_to_entries("a.com\nb.com, c.com\n\n  \n,d.com");
        assert_eq!(entries, vec!["a.com", "b.com", "c.com", "d.com"]);
    }

    #[test]
    fn test_entries_to_text() {
        let text = entries_to_text(&[json!("a.com"), json!(42), json!("b.com")]);
        assert_eq!(text, "a.com\n42\nb.com");
    }
}
