//! Settings area persisted as one JSON document.
//!
//! Every write goes to `<file>.tmp` first and is renamed over the document,
//! so a crash never leaves a half-written file behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{check_quota, SettingsArea, SETTINGS_AREA};
use crate::error::StoreError;
use crate::storage::EngineError;

/// Settings area kept as one JSON document on disk.
///
/// Writes go to a temporary sibling and are renamed into place; the cache only
/// changes once the rename succeeds.
pub struct FileSettings {
    path: PathBuf,
    /// Contents of the document as last written successfully.
    entries: RwLock<BTreeMap<String, String>>,
    quota: usize,
}

impl FileSettings {
    /// Loads the document at `path`. A missing file is an empty area.
    ///
    /// Fails with [`StoreError::StorageUnavailable`] if the parent directory
    /// cannot be created, and with a read failure if the file is not a
    /// settings document.
    pub fn open(path: impl Into<PathBuf>, quota: usize) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::StorageUnavailable {
                reason: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                warn!(path = %path.display(), error = %e, "settings file is corrupt");
                StoreError::read(SETTINGS_AREA, EngineError::Corrupt(e))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::read(SETTINGS_AREA, EngineError::Io(e))),
        };
        debug!(path = %path.display(), keys = entries.len(), "loaded settings");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            quota,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| StoreError::write(SETTINGS_AREA, EngineError::Corrupt(e)))?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)
            .and_then(|()| fs::rename(&temp_path, &self.path))
            .map_err(|e| {
                warn!(path = %self.path.display(), error = %e, "failed to write settings");
                StoreError::write(SETTINGS_AREA, EngineError::Io(e))
            })
    }

    /// Applies `change` to a copy of the entries and commits it once the
    /// document is on disk.
    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl SettingsArea for FileSettings {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            check_quota(entries, key, value, self.quota)?;
            entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if !self.entries.read().contains_key(key) {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
            Ok(())
        })
    }
}
