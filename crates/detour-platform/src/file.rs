//! JSON-file settings store
//!
//! Persists settings as a single JSON object and detects external edits by
//! polling the file's modification time, broadcasting a delta when the
//! content changed.

use crate::error::{PlatformError, Result};
use detour_core::error::Result as CoreResult;
use detour_core::ports::SettingsStore;
use detour_core::settings::{RawSettings, SettingsDelta};
use parking_lot::RwLock;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct FileState {
    values: RawSettings,
    last_modified: Option<SystemTime>,
}

/// Settings store backed by a JSON object file.
pub struct FileStore {
    path: PathBuf,
    state: RwLock<FileState>,
    changes: broadcast::Sender<SettingsDelta>,
}

impl FileStore {
    /// Open a store at the given path. A missing file behaves as an empty
    /// store until the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => FileState {
                values: parse_object(&path, &content)?,
                last_modified: modification_time(&path),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => FileState::default(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
            changes: broadcast::channel(CHANGE_CHANNEL_CAPACITY).0,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seed the backing file with `values` when it does not exist yet,
    /// creating parent directories as needed. Returns `true` when the file
    /// was created.
    pub async fn ensure_initialized(&self, values: &RawSettings) -> Result<bool> {
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => return Ok(false),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        write_object(&self.path, values).await?;

        let mut state = self.state.write();
        state.values = values.clone();
        state.last_modified = modification_time(&self.path);
        info!(path = %self.path.display(), "seeded settings file");
        Ok(true)
    }

    /// Check the backing file for external edits and broadcast a delta when
    /// its content changed. Returns `true` when a change was picked up.
    pub async fn poll_changes(&self) -> Result<bool> {
        let Some((values, modified)) = self.read_if_changed().await? else {
            return Ok(false);
        };

        let delta = {
            let mut state = self.state.write();
            let delta = SettingsDelta::between(&state.values, &values);
            state.values = values;
            state.last_modified = modified;
            delta
        };

        if delta.is_empty() {
            return Ok(false);
        }
        debug!(path = %self.path.display(), "settings file changed on disk");
        let _ = self.changes.send(delta);
        Ok(true)
    }

    /// Reload the cache from disk without notifying, so reads observe
    /// external edits.
    async fn refresh(&self) -> Result<()> {
        if let Some((values, modified)) = self.read_if_changed().await? {
            let mut state = self.state.write();
            state.values = values;
            state.last_modified = modified;
        }
        Ok(())
    }

    /// Read the file when its mtime moved since the cached read.
    async fn read_if_changed(&self) -> Result<Option<(RawSettings, Option<SystemTime>)>> {
        let modified = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.modified().ok(),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        {
            let state = self.state.read();
            if state.last_modified == modified {
                return Ok(None);
            }
        }

        let values = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => parse_object(&self.path, &content)?,
            Err(err) if err.kind() == ErrorKind::NotFound => RawSettings::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Some((values, modified)))
    }
}

#[async_trait::async_trait]
impl SettingsStore for FileStore {
    async fn get(&self, defaults: &RawSettings) -> CoreResult<RawSettings> {
        self.refresh().await.map_err(detour_core::Error::from)?;

        let stored = self.state.read();
        let mut result = defaults.clone();
        for (key, value) in result.iter_mut() {
            if let Some(stored_value) = stored.values.get(key) {
                *value = stored_value.clone();
            }
        }
        Ok(result)
    }

    async fn set(&self, values: RawSettings) -> CoreResult<()> {
        // Pick up external edits before merging; last write wins
        self.refresh().await.map_err(detour_core::Error::from)?;

        let (old, merged) = {
            let state = self.state.read();
            let old = state.values.clone();
            let mut merged = old.clone();
            merged.extend(values);
            (old, merged)
        };

        write_object(&self.path, &merged)
            .await
            .map_err(detour_core::Error::from)?;
        let modified = modification_time(&self.path);

        let delta = SettingsDelta::between(&old, &merged);
        {
            let mut state = self.state.write();
            state.values = merged;
            state.last_modified = modified;
        }

        if !delta.is_empty() {
            let _ = self.changes.send(delta);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsDelta> {
        self.changes.subscribe()
    }
}

fn parse_object(path: &Path, content: &str) -> Result<RawSettings> {
    let value: Value = serde_json::from_str(content)?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(PlatformError::invalid_settings_file(
            path.display().to_string(),
            "expected a JSON object",
        )),
    }
}

async fn write_object(path: &Path, values: &RawSettings) -> Result<()> {
    let mut content = serde_json::to_string_pretty(&Value::Object(values.clone()))?;
    content.push('\n');
    tokio::fs::write(path, content).await?;
    Ok(())
}

fn modification_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|meta| meta.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use detour_core::settings::{KEY_BLOCKED_ENTRIES, KEY_REDIRECT_TARGET};
    use serde_json::json;
    use std::time::Duration;

    fn defaults() -> RawSettings {
        RawSettings::from_iter([
            (KEY_REDIRECT_TARGET.to_string(), json!("https://d.example/")),
            (KEY_BLOCKED_ENTRIES.to_string(), Value::Null),
        ])
    }

    #[tokio::test]
    async fn test_missing_file_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("settings.json")).unwrap();

        let values = store.get(&defaults()).await.unwrap();
        assert_eq!(values.get(KEY_REDIRECT_TARGET), Some(&json!("https://d.example/")));
        assert_eq!(values.get(KEY_BLOCKED_ENTRIES), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_set_roundtrips_and_broadcasts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = FileStore::open(&path).unwrap();
        let mut rx = store.subscribe();

        store
            .set(RawSettings::from_iter([(
                KEY_BLOCKED_ENTRIES.to_string(),
                json!(["example.com"]),
            )]))
            .await
            .unwrap();

        let delta = rx.try_recv().unwrap();
        assert_eq!(
            delta.blocked_entries.unwrap().new_value,
            Some(json!(["example.com"]))
        );

        // A fresh store sees the written values
        let reopened = FileStore::open(&path).unwrap();
        let values = reopened.get(&defaults()).await.unwrap();
        assert_eq!(values.get(KEY_BLOCKED_ENTRIES), Some(&json!(["example.com"])));
    }

    #[tokio::test]
    async fn test_poll_detects_external_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{\"blockedEntries\": [\"a.com\"]}\n").unwrap();

        let store = FileStore::open(&path).unwrap();
        let mut rx = store.subscribe();
        assert!(!store.poll_changes().await.unwrap());

        // mtime granularity
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(&path, "{\"blockedEntries\": [\"b.com\"]}\n").unwrap();

        assert!(store.poll_changes().await.unwrap());
        let delta = rx.try_recv().unwrap();
        let change = delta.blocked_entries.unwrap();
        assert_eq!(change.old_value, Some(json!(["a.com"])));
        assert_eq!(change.new_value, Some(json!(["b.com"])));

        // Nothing further pending
        assert!(!store.poll_changes().await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ensure_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = FileStore::open(&path).unwrap();

        let seed = RawSettings::from_iter([(
            KEY_REDIRECT_TARGET.to_string(),
            json!("https://d.example/"),
        )]);
        assert!(store.ensure_initialized(&seed).await.unwrap());
        assert!(!store.ensure_initialized(&seed).await.unwrap());

        let values = store.get(&defaults()).await.unwrap();
        assert_eq!(values.get(KEY_REDIRECT_TARGET), Some(&json!("https://d.example/")));
    }

    #[tokio::test]
    async fn test_non_object_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "[1, 2, 3]\n").unwrap();

        assert!(FileStore::open(&path).is_err());
    }
}
