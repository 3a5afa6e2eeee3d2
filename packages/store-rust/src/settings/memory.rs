use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{check_quota, SettingsArea};
use crate::error::StoreError;

/// Settings area that lives as long as the process.
pub struct MemorySettings {
    entries: RwLock<BTreeMap<String, String>>,
    quota: usize,
}

impl MemorySettings {
    /// Creates an empty area holding at most `quota` bytes.
    #[must_use]
    pub fn new(quota: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota,
        }
    }
}

impl SettingsArea for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        check_quota(&entries, key, value, self.quota)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}
