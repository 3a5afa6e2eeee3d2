//! In-memory [`StorageEngine`] implementation backed by [`DashMap`].
//!
//! [`MemoryStorage`] plays the part of the platform's local store: it holds
//! the data and can hand out several connections ([`MemoryEngine`]) to it.
//! A schema upgrade requested while another connection is alive is blocked,
//! the same way a browser's object store refuses a version change while
//! another tab holds it open.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use haven_core::RecordKey;
use parking_lot::Mutex;

use crate::storage::engine::{EngineError, IndexEntry, StorageEngine};
use crate::storage::schema::Schema;

#[derive(Default)]
struct IndexData {
    by_value: HashMap<String, BTreeSet<String>>,
    by_key: HashMap<String, String>,
}

/// One collection's records, indexes and id sequence.
///
/// Held inside a `DashMap` entry, so every method runs under that entry's
/// lock and is atomic with respect to the collection.
#[derive(Default)]
struct CollectionData {
    auto_id: bool,
    records: BTreeMap<String, Vec<u8>>,
    last_id: u64,
    indexes: HashMap<String, IndexData>,
}

impl CollectionData {
    fn check_entries(&self, collection: &str, entries: &[IndexEntry]) -> Result<(), EngineError> {
        match entries
            .iter()
            .find(|e| !self.indexes.contains_key(e.index))
        {
            Some(entry) => Err(EngineError::MissingIndex {
                collection: collection.to_string(),
                index: entry.index.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn unindex(&mut self, key: &str) {
        for index in self.indexes.values_mut() {
            if let Some(old) = index.by_key.remove(key) {
                if let Some(keys) = index.by_value.get_mut(&old) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.by_value.remove(&old);
                    }
                }
            }
        }
    }

    fn write(&mut self, key: String, value: Vec<u8>, entries: &[IndexEntry]) {
        self.unindex(&key);
        for entry in entries {
            if let Some(index) = self.indexes.get_mut(entry.index) {
                index
                    .by_value
                    .entry(entry.value.clone())
                    .or_default()
                    .insert(key.clone());
                index.by_key.insert(key.clone(), entry.value.clone());
            }
        }
        self.records.insert(key, value);
    }
}

struct Shared {
    collections: DashMap<String, CollectionData>,
    version: Mutex<u32>,
    connections: AtomicUsize,
}

/// Process-local storage that outlives individual connections.
///
/// Cloning yields another handle to the same data.
#[derive(Clone)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
}

impl MemoryStorage {
    /// Creates new, empty storage at schema version 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                collections: DashMap::new(),
                version: Mutex::new(0),
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Opens a new connection to this storage.
    #[must_use]
    pub fn connect(&self) -> MemoryEngine {
        self.shared.connections.fetch_add(1, Ordering::SeqCst);
        MemoryEngine {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of connections currently alive.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection to a [`MemoryStorage`]. Dropping it closes the connection.
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl Drop for MemoryEngine {
    fn drop(&mut self) {
        self.shared.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

fn missing(collection: &str) -> EngineError {
    EngineError::MissingCollection(collection.to_string())
}

impl StorageEngine for MemoryEngine {
    fn schema_version(&self) -> Result<u32, EngineError> {
        Ok(*self.shared.version.lock())
    }

    fn apply_schema(&self, schema: &Schema) -> Result<(), EngineError> {
        let mut version = self.shared.version.lock();
        if *version > schema.version {
            return Err(EngineError::SchemaTooNew {
                found: *version,
                supported: schema.version,
            });
        }
        if *version == schema.version {
            return Ok(());
        }

        let others = self
            .shared
            .connections
            .load(Ordering::SeqCst)
            .saturating_sub(1);
        if others > 0 {
            return Err(EngineError::Blocked(format!(
                "{others} other connection(s) open during upgrade to version {}",
                schema.version
            )));
        }

        for def in &schema.collections {
            let mut data = self
                .shared
                .collections
                .entry(def.name.to_string())
                .or_default();
            data.auto_id = def.auto_id;
            for index in &def.indexes {
                data.indexes.entry((*index).to_string()).or_default();
            }
        }
        *version = schema.version;
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let data = self
            .shared
            .collections
            .get(collection)
            .ok_or_else(|| missing(collection))?;
        Ok(data.records.get(key).cloned())
    }

    fn put(
        &self,
        collection: &str,
        key: &RecordKey,
        value: &[u8],
        index: &[IndexEntry],
    ) -> Result<(), EngineError> {
        let mut data = self
            .shared
            .collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        data.check_entries(collection, index)?;
        if let RecordKey::Id(id) = key {
            if data.auto_id {
                data.last_id = data.last_id.max(*id);
            }
        }
        data.write(key.encode(), value.to_vec(), index);
        Ok(())
    }

    fn insert_with_id(
        &self,
        collection: &str,
        index: &[IndexEntry],
        encode: &mut dyn FnMut(u64) -> Result<Vec<u8>, EngineError>,
    ) -> Result<u64, EngineError> {
        let mut data = self
            .shared
            .collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        data.check_entries(collection, index)?;
        let id = data
            .last_id
            .checked_add(1)
            .ok_or_else(|| EngineError::SequenceExhausted(collection.to_string()))?;
        let value = encode(id)?;
        data.last_id = id;
        data.write(id.to_string(), value, index);
        Ok(id)
    }

    fn remove(&self, collection: &str, key: &str) -> Result<bool, EngineError> {
        let mut data = self
            .shared
            .collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        data.unindex(key);
        Ok(data.records.remove(key).is_some())
    }

    fn entries(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, EngineError> {
        let data = self
            .shared
            .collections
            .get(collection)
            .ok_or_else(|| missing(collection))?;
        Ok(data
            .records
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn keys(&self, collection: &str) -> Result<Vec<String>, EngineError> {
        let data = self
            .shared
            .collections
            .get(collection)
            .ok_or_else(|| missing(collection))?;
        Ok(data.records.keys().cloned().collect())
    }

    fn index_lookup(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> Result<Vec<Vec<u8>>, EngineError> {
        let data = self
            .shared
            .collections
            .get(collection)
            .ok_or_else(|| missing(collection))?;
        let index_data = data
            .indexes
            .get(index)
            .ok_or_else(|| EngineError::MissingIndex {
                collection: collection.to_string(),
                index: index.to_string(),
            })?;
        Ok(index_data
            .by_value
            .get(value)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| data.records.get(k).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}
