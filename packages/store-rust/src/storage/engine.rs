//! Low-level storage engine trait.
//!
//! Defines [`StorageEngine`], the innermost storage layer: a transactional
//! key-value store holding named collections of serialized records, the
//! secondary indexes declared on them, and a per-collection id sequence.
//! Every method is a single transaction scoped to one collection.

use haven_core::RecordKey;

use super::schema::Schema;

/// One secondary-index entry written alongside a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Name of the index (as declared in the [`Schema`]).
    pub index: &'static str,
    /// Indexed field value.
    pub value: String,
}

/// Engine-level failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The backing storage cannot be opened at all.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// Another connection holds the storage and prevents opening or upgrading it.
    #[error("storage is held by another connection: {0}")]
    Blocked(String),
    #[error("stored schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },
    #[error("collection `{0}` does not exist")]
    MissingCollection(String),
    /// The collection's id sequence has no id left to hand out.
    #[error("id sequence of `{0}` is exhausted")]
    SequenceExhausted(String),
    #[error("index `{index}` does not exist on `{collection}`")]
    MissingIndex { collection: String, index: String },
    /// A stored key does not match the collection's key kind.
    #[error("stored key `{0}` is malformed")]
    InvalidKey(String),
    /// A stored value could not be encoded or decoded.
    #[error("record encoding failed: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "redb")]
    #[error("redb error: {0}")]
    Redb(#[source] redb::Error),
}

/// Transactional key-value storage with named collections.
///
/// All operations are synchronous and atomic per collection: a record, its
/// index entries and the collection's id sequence commit together or not at
/// all. Shared as `Arc<dyn StorageEngine>`.
pub trait StorageEngine: Send + Sync + 'static {
    /// Schema version currently recorded in storage. 0 for fresh storage.
    fn schema_version(&self) -> Result<u32, EngineError>;

    /// Creates missing collections and indexes and records `schema.version`.
    ///
    /// Fails with [`EngineError::SchemaTooNew`] if storage is newer than
    /// `schema`, and with [`EngineError::Blocked`] if another connection
    /// prevents an upgrade.
    fn apply_schema(&self, schema: &Schema) -> Result<(), EngineError>;

    /// Retrieve a record by key, or `None` if not present.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, EngineError>;

    /// Insert or replace a record.
    ///
    /// Replaces the record's previous index entries with `index`. For an id
    /// key, advances the collection's sequence past that id.
    fn put(
        &self,
        collection: &str,
        key: &RecordKey,
        value: &[u8],
        index: &[IndexEntry],
    ) -> Result<(), EngineError>;

    /// Allocates the next id, encodes the record with it, and stores it.
    ///
    /// Ids are never reused, even after the record holding one is removed.
    fn insert_with_id(
        &self,
        collection: &str,
        index: &[IndexEntry],
        encode: &mut dyn FnMut(u64) -> Result<Vec<u8>, EngineError>,
    ) -> Result<u64, EngineError>;

    /// Remove a record and its index entries. Returns whether it existed.
    fn remove(&self, collection: &str, key: &str) -> Result<bool, EngineError>;

    /// Every `(key, value)` pair in the collection, in unspecified order.
    fn entries(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, EngineError>;

    /// Every key in the collection, in unspecified order.
    fn keys(&self, collection: &str) -> Result<Vec<String>, EngineError>;

    /// Values of every record whose `index` field equals `value`.
    fn index_lookup(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> Result<Vec<Vec<u8>>, EngineError>;
}
