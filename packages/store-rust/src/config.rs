//! Store configuration.

use std::path::{Path, PathBuf};

/// File name of the record database inside the data directory.
pub const DATABASE_FILE: &str = "haven.redb";
/// File name of the settings document inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "HAVEN_DATA_DIR";
/// Environment variable overriding the settings quota in bytes.
pub const SETTINGS_QUOTA_ENV: &str = "HAVEN_SETTINGS_QUOTA_BYTES";

/// Where records and settings are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Volatile storage that lives as long as the process.
    InMemory,
    /// Persistent storage under the given directory.
    Directory(PathBuf),
}

/// Top-level configuration for a [`RecordStore`](crate::RecordStore) and its
/// settings area.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StorageBackend,
    /// Maximum total size of the settings area (keys plus values) in bytes.
    pub settings_quota_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::InMemory,
            settings_quota_bytes: 5 * 1024 * 1024, // 5 MiB
        }
    }
}

impl StoreConfig {
    /// Persistent configuration rooted at `dir`, other fields defaulted.
    #[must_use]
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Directory(dir.into()),
            ..Self::default()
        }
    }

    /// Reads `HAVEN_DATA_DIR` and `HAVEN_SETTINGS_QUOTA_BYTES`.
    ///
    /// Falls back to the in-memory backend when no data directory is set.
    /// An unparsable quota is ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::directory(dir),
            _ => Self::default(),
        };
        if let Ok(raw) = std::env::var(SETTINGS_QUOTA_ENV) {
            match raw.trim().parse() {
                Ok(quota) => config.settings_quota_bytes = quota,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {}", SETTINGS_QUOTA_ENV),
            }
        }
        config
    }

    /// Data directory, if the backend is persistent.
    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        match &self.backend {
            StorageBackend::InMemory => None,
            StorageBackend::Directory(dir) => Some(dir),
        }
    }

    #[must_use]
    pub fn database_path(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join(DATABASE_FILE))
    }

    #[must_use]
    pub fn settings_path(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join(SETTINGS_FILE))
    }
}
