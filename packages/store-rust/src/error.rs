//! Error taxonomy surfaced to callers of the record store and settings area.

use std::fmt;
use std::sync::Arc;

use haven_core::{Collection, ValidationError};

use crate::storage::EngineError;

/// Whether a failed operation was reading or writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => f.write_str("read"),
            AccessMode::Write => f.write_str("write"),
        }
    }
}

/// Errors returned by [`RecordStore`](crate::RecordStore) and
/// [`Settings`](crate::Settings).
///
/// "Not found" is never an error: lookups return `Ok(None)`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// No persistent local storage could be opened on this machine.
    #[error("persistent local storage is unavailable: {reason}")]
    StorageUnavailable { reason: String },

    /// Another open session holds the data and prevents the upgrade.
    #[error(
        "storage upgrade is blocked by another open session; \
         close other windows or sessions using this data and retry"
    )]
    BlockedUpgrade,

    /// A settings write would exceed the settings area's quota.
    #[error("settings storage is full: writing `{key}` needs {needed} bytes, quota is {quota}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    /// The caller passed a record or key the collection cannot accept.
    #[error("invalid {collection} record: {reason}")]
    InvalidRecord { collection: String, reason: String },

    /// The stored data was written by a newer version of the app.
    #[error("stored data uses schema version {found}, newer than supported version {supported}")]
    IncompatibleSchema { found: u32, supported: u32 },

    /// Any other engine failure.
    #[error("{mode} on `{collection}` failed: {source}")]
    OperationFailed {
        collection: String,
        mode: AccessMode,
        #[source]
        source: Arc<EngineError>,
    },
}

impl StoreError {
    pub(crate) fn invalid(collection: Collection, reason: impl fmt::Display) -> Self {
        StoreError::InvalidRecord {
            collection: collection.name().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn validation(collection: Collection, err: &ValidationError) -> Self {
        Self::invalid(collection, err)
    }

    pub(crate) fn read(collection: impl Into<String>, source: EngineError) -> Self {
        StoreError::OperationFailed {
            collection: collection.into(),
            mode: AccessMode::Read,
            source: Arc::new(source),
        }
    }

    pub(crate) fn write(collection: impl Into<String>, source: EngineError) -> Self {
        StoreError::OperationFailed {
            collection: collection.into(),
            mode: AccessMode::Write,
            source: Arc::new(source),
        }
    }

    /// Maps a failure while opening the engine onto the open-specific variants.
    pub(crate) fn from_open(source: EngineError) -> Self {
        match source {
            EngineError::Unavailable(reason) => StoreError::StorageUnavailable { reason },
            EngineError::Blocked(_) => StoreError::BlockedUpgrade,
            EngineError::SchemaTooNew { found, supported } => {
                StoreError::IncompatibleSchema { found, supported }
            }
            other => StoreError::write("schema", other),
        }
    }

    /// True when the user can fix the failure by closing other sessions.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, StoreError::BlockedUpgrade)
    }
}
