//! Settings area: small string lists kept outside the record collections.
//!
//! [`SettingsArea`] is a flat, synchronous key-value store whose values are
//! JSON documents. [`Settings`] layers the typed list helpers on top and is
//! what callers use.

mod file;
mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use haven_core::milestones::milestones_reached;
use haven_core::settings::{
    normalize_list, normalize_personal_values, DISTRACTIONS_KEY, EARNED_BADGES_KEY,
    PERSONAL_VALUES_KEY,
};
use tracing::debug;

pub use file::FileSettings;
pub use memory::MemorySettings;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::storage::EngineError;

/// Name used for the settings area in [`StoreError::OperationFailed`].
pub const SETTINGS_AREA: &str = "settings";

/// Flat key-value storage for small JSON values.
///
/// Writes that would push the area past its byte quota fail with
/// [`StoreError::QuotaExceeded`] and leave the previous value in place.
pub trait SettingsArea: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Opens the settings area described by `config`.
pub fn open_settings(config: &StoreConfig) -> Result<Arc<dyn SettingsArea>, StoreError> {
    match config.settings_path() {
        Some(path) => Ok(Arc::new(FileSettings::open(
            path,
            config.settings_quota_bytes,
        )?)),
        None => Ok(Arc::new(MemorySettings::new(config.settings_quota_bytes))),
    }
}

/// Bytes the area would hold after writing `value` under `key`.
///
/// Counts key and value lengths, like a browser's local storage quota.
fn size_after_write(entries: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
    let others: usize = entries
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| k.len() + v.len())
        .sum();
    others + key.len() + value.len()
}

fn check_quota(
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    quota: usize,
) -> Result<(), StoreError> {
    let needed = size_after_write(entries, key, value);
    if needed > quota {
        return Err(StoreError::QuotaExceeded {
            key: key.to_string(),
            needed,
            quota,
        });
    }
    Ok(())
}

/// Typed access to the lists kept in a [`SettingsArea`].
///
/// Every mutation reads the whole list, changes it in memory and writes the
/// whole list back.
#[derive(Clone)]
pub struct Settings {
    area: Arc<dyn SettingsArea>,
}

impl Settings {
    #[must_use]
    pub fn new(area: Arc<dyn SettingsArea>) -> Self {
        Self { area }
    }

    /// Opens the settings area for `config` and wraps it.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        open_settings(config).map(Self::new)
    }

    /// Settings kept in memory only, with the default quota.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySettings::new(
            StoreConfig::default().settings_quota_bytes,
        )))
    }

    /// The underlying key-value area.
    #[must_use]
    pub fn area(&self) -> &Arc<dyn SettingsArea> {
        &self.area
    }

    fn load(&self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.area.get(key)? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| StoreError::read(SETTINGS_AREA, EngineError::Corrupt(e))),
        }
    }

    fn save(&self, key: &str, list: &[String]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(list)
            .map_err(|e| StoreError::write(SETTINGS_AREA, EngineError::Corrupt(e)))?;
        self.area.set(key, &raw)?;
        debug!(key, entries = list.len(), "saved settings list");
        Ok(())
    }

    // --- Badges ---

    pub fn earned_badges(&self) -> Result<Vec<String>, StoreError> {
        self.load(EARNED_BADGES_KEY)
    }

    /// Replaces the earned badge list.
    pub fn save_earned_badges<S: AsRef<str>>(&self, badges: &[S]) -> Result<Vec<String>, StoreError> {
        let badges = normalize_list(badges);
        self.save(EARNED_BADGES_KEY, &badges)?;
        Ok(badges)
    }

    /// Adds every id in `ids` not earned yet and returns the newly earned ones.
    ///
    /// Nothing is written when no id is new.
    pub fn award_badges<I, S>(&self, ids: I) -> Result<Vec<String>, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut earned = self.earned_badges()?;
        let mut fresh = Vec::new();
        for id in normalize_list(ids) {
            if !earned.contains(&id) {
                earned.push(id.clone());
                fresh.push(id);
            }
        }
        if !fresh.is_empty() {
            self.save(EARNED_BADGES_KEY, &earned)?;
        }
        Ok(fresh)
    }

    /// Awards the sobriety milestones reached after `days` sober days.
    pub fn award_sobriety_milestones(&self, days: i64) -> Result<Vec<String>, StoreError> {
        self.award_badges(milestones_reached(days))
    }

    // --- Personal values ---

    pub fn personal_values(&self) -> Result<Vec<String>, StoreError> {
        self.load(PERSONAL_VALUES_KEY)
    }

    /// Normalizes and stores the personal values list.
    ///
    /// More than seven distinct values is rejected as an invalid record.
    pub fn save_personal_values<S: AsRef<str>>(
        &self,
        values: &[S],
    ) -> Result<Vec<String>, StoreError> {
        let values =
            normalize_personal_values(values).map_err(|e| StoreError::InvalidRecord {
                collection: PERSONAL_VALUES_KEY.to_string(),
                reason: e.to_string(),
            })?;
        self.save(PERSONAL_VALUES_KEY, &values)?;
        Ok(values)
    }

    // --- Distractions ---

    pub fn distractions(&self) -> Result<Vec<String>, StoreError> {
        self.load(DISTRACTIONS_KEY)
    }

    /// Normalizes and stores the distraction list.
    pub fn save_distractions<S: AsRef<str>>(
        &self,
        items: &[S],
    ) -> Result<Vec<String>, StoreError> {
        let items = normalize_list(items);
        self.save(DISTRACTIONS_KEY, &items)?;
        Ok(items)
    }

    /// Appends `item` unless it is blank or already present.
    pub fn add_distraction(&self, item: &str) -> Result<Vec<String>, StoreError> {
        let mut items = self.distractions()?;
        items.push(item.to_string());
        self.save_distractions(&items)
    }

    /// Removes `item` (compared after trimming). Absent items are ignored.
    pub fn remove_distraction(&self, item: &str) -> Result<Vec<String>, StoreError> {
        let item = item.trim();
        let items: Vec<String> = self
            .distractions()?
            .into_iter()
            .filter(|existing| existing != item)
            .collect();
        self.save_distractions(&items)
    }
}
