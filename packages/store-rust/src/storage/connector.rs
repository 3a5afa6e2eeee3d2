//! Connectors that open a [`StorageEngine`] for a [`RecordStore`].
//!
//! [`Connector`] is the dependency-injection point of the store: production
//! code picks one from a [`StoreConfig`] with [`connector_for`], tests hand
//! in their own.
//!
//! [`RecordStore`]: crate::RecordStore

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageBackend, StoreConfig};
use crate::storage::engine::{EngineError, StorageEngine};
use crate::storage::engines::MemoryStorage;

/// Opens a connection to a storage engine.
///
/// Used as `Arc<dyn Connector>`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new connection. Does not apply the schema.
    async fn connect(&self) -> Result<Arc<dyn StorageEngine>, EngineError>;

    /// Short description of the target, for logs.
    fn describe(&self) -> String;
}

/// Connects to a shared [`MemoryStorage`].
#[derive(Clone, Default)]
pub struct MemoryConnector {
    storage: MemoryStorage,
}

impl MemoryConnector {
    #[must_use]
    pub fn new(storage: MemoryStorage) -> Self {
        Self { storage }
    }

    /// The storage this connector opens connections to.
    #[must_use]
    pub fn storage(&self) -> &MemoryStorage {
        &self.storage
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn StorageEngine>, EngineError> {
        Ok(Arc::new(self.storage.connect()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Opens a redb database file on a blocking thread.
#[cfg(feature = "redb")]
#[derive(Debug, Clone)]
pub struct RedbConnector {
    path: std::path::PathBuf,
}

#[cfg(feature = "redb")]
impl RedbConnector {
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(feature = "redb")]
#[async_trait]
impl Connector for RedbConnector {
    async fn connect(&self) -> Result<Arc<dyn StorageEngine>, EngineError> {
        let path = self.path.clone();
        let engine = tokio::task::spawn_blocking(move || {
            crate::storage::engines::RedbEngine::open(&path)
        })
        .await
        .map_err(|e| EngineError::Unavailable(format!("open task failed: {e}")))??;
        Ok(Arc::new(engine))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Stand-in used when persistent storage was compiled out.
#[cfg(not(feature = "redb"))]
struct UnavailableConnector {
    reason: String,
}

#[cfg(not(feature = "redb"))]
#[async_trait]
impl Connector for UnavailableConnector {
    async fn connect(&self) -> Result<Arc<dyn StorageEngine>, EngineError> {
        Err(EngineError::Unavailable(self.reason.clone()))
    }

    fn describe(&self) -> String {
        "unavailable".to_string()
    }
}

/// Builds the connector described by `config`.
///
/// Each call to `connector_for` with [`StorageBackend::InMemory`] gets fresh,
/// empty storage.
#[must_use]
pub fn connector_for(config: &StoreConfig) -> Arc<dyn Connector> {
    match &config.backend {
        StorageBackend::InMemory => Arc::new(MemoryConnector::default()),
        #[cfg(feature = "redb")]
        StorageBackend::Directory(_) => {
            let path = config
                .database_path()
                .unwrap_or_else(|| crate::config::DATABASE_FILE.into());
            Arc::new(RedbConnector::new(path))
        }
        #[cfg(not(feature = "redb"))]
        StorageBackend::Directory(dir) => Arc::new(UnavailableConnector {
            reason: format!(
                "cannot persist to {}: built without the `redb` feature",
                dir.display()
            ),
        }),
    }
}
