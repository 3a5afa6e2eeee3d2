//! Persistent [`StorageEngine`] implementation backed by [`redb`].
//!
//! Layout inside the database file:
//! - one table per collection: `key -> serialized record`;
//! - per secondary index, a multimap `value -> key` plus a reverse table
//!   `key -> value` used to drop stale entries on replace and remove;
//! - a `__meta` table holding the schema version and each collection's
//!   id sequence.
//!
//! redb holds an exclusive lock on the file, so a second process opening the
//! same data fails with [`EngineError::Blocked`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use haven_core::RecordKey;
use parking_lot::RwLock;
use redb::{
    Database, DatabaseError, MultimapTableDefinition, ReadableTable,
    StorageError, TableDefinition, TableError, WriteTransaction,
};
use tracing::{debug, info};

use crate::storage::engine::{EngineError, IndexEntry, StorageEngine};
use crate::storage::schema::{CollectionDef, Schema};

const META: TableDefinition<&str, u64> = TableDefinition::new("__meta");
const VERSION_KEY: &str = "schema_version";

fn records_table(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

fn index_table(name: &str) -> MultimapTableDefinition<'_, &'static str, &'static str> {
    MultimapTableDefinition::new(name)
}

fn reverse_table(name: &str) -> TableDefinition<'_, &'static str, &'static str> {
    TableDefinition::new(name)
}

fn index_name(collection: &str, index: &str) -> String {
    format!("{collection}.by_{index}")
}

fn reverse_name(collection: &str, index: &str) -> String {
    format!("{collection}.by_{index}.rev")
}

fn sequence_key(collection: &str) -> String {
    format!("seq:{collection}")
}

impl From<redb::Error> for EngineError {
    fn from(err: redb::Error) -> Self {
        match err {
            redb::Error::TableDoesNotExist(name) => EngineError::MissingCollection(name),
            redb::Error::DatabaseAlreadyOpen => {
                EngineError::Blocked("database file is already open".to_string())
            }
            other => EngineError::Redb(other),
        }
    }
}

fn redb_err(err: impl Into<redb::Error>) -> EngineError {
    EngineError::from(err.into())
}

/// redb-backed storage engine.
pub struct RedbEngine {
    db: Database,
    path: Option<PathBuf>,
    catalog: RwLock<HashMap<String, CollectionDef>>,
}

impl RedbEngine {
    /// Opens (or creates) the database file at `path`.
    ///
    /// Creates the parent directory if needed. Fails with
    /// [`EngineError::Unavailable`] when the file cannot be created and with
    /// [`EngineError::Blocked`] when another process holds it.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EngineError::Unavailable(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        let db = Database::create(path).map_err(|e| match e {
            DatabaseError::DatabaseAlreadyOpen => {
                EngineError::Blocked(format!("{} is open in another session", path.display()))
            }
            DatabaseError::Storage(StorageError::Io(io)) => {
                EngineError::Unavailable(format!("cannot open {}: {io}", path.display()))
            }
            other => redb_err(other),
        })?;
        info!(path = %path.display(), "opened redb database");
        Ok(Self {
            db,
            path: Some(path.to_path_buf()),
            catalog: RwLock::new(HashMap::new()),
        })
    }

    /// Opens a database that lives only in memory. Used by tests.
    pub fn in_memory() -> Result<Self, EngineError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(redb_err)?;
        Ok(Self {
            db,
            path: None,
            catalog: RwLock::new(HashMap::new()),
        })
    }

    /// Path of the database file, `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn def(&self, collection: &str) -> Result<CollectionDef, EngineError> {
        self.catalog
            .read()
            .get(collection)
            .cloned()
            .ok_or_else(|| EngineError::MissingCollection(collection.to_string()))
    }

    fn read_sequence(txn: &WriteTransaction, collection: &str) -> Result<u64, EngineError> {
        let meta = txn.open_table(META).map_err(redb_err)?;
        let current = meta
            .get(sequence_key(collection).as_str())
            .map_err(redb_err)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        Ok(current)
    }

    fn write_sequence(txn: &WriteTransaction, collection: &str, id: u64) -> Result<(), EngineError> {
        let mut meta = txn.open_table(META).map_err(redb_err)?;
        meta.insert(sequence_key(collection).as_str(), id)
            .map_err(redb_err)?;
        Ok(())
    }

    /// Replaces the index entries of `key` with `entries`.
    fn reindex(
        txn: &WriteTransaction,
        def: &CollectionDef,
        key: &str,
        entries: &[IndexEntry],
    ) -> Result<(), EngineError> {
        for index in &def.indexes {
            let forward_name = index_name(def.name, index);
            let rev_name = reverse_name(def.name, index);
            let mut forward = txn
                .open_multimap_table(index_table(&forward_name))
                .map_err(redb_err)?;
            let mut reverse = txn.open_table(reverse_table(&rev_name)).map_err(redb_err)?;

            let old = reverse
                .remove(key)
                .map_err(redb_err)?
                .map(|guard| guard.value().to_string());
            if let Some(old) = old {
                forward.remove(old.as_str(), key).map_err(redb_err)?;
            }
            if let Some(entry) = entries.iter().find(|e| e.index == *index) {
                forward
                    .insert(entry.value.as_str(), key)
                    .map_err(redb_err)?;
                reverse
                    .insert(key, entry.value.as_str())
                    .map_err(redb_err)?;
            }
        }
        Ok(())
    }
}

fn check_entries(def: &CollectionDef, entries: &[IndexEntry]) -> Result<(), EngineError> {
    match entries.iter().find(|e| !def.has_index(e.index)) {
        Some(entry) => Err(EngineError::MissingIndex {
            collection: def.name.to_string(),
            index: entry.index.to_string(),
        }),
        None => Ok(()),
    }
}

impl StorageEngine for RedbEngine {
    fn schema_version(&self) -> Result<u32, EngineError> {
        let txn = self.db.begin_read().map_err(redb_err)?;
        let meta = match txn.open_table(META) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(0),
            Err(e) => return Err(redb_err(e)),
        };
        let version = meta
            .get(VERSION_KEY)
            .map_err(redb_err)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        Ok(u32::try_from(version).unwrap_or(u32::MAX))
    }

    fn apply_schema(&self, schema: &Schema) -> Result<(), EngineError> {
        let stored = self.schema_version()?;
        if stored > schema.version {
            return Err(EngineError::SchemaTooNew {
                found: stored,
                supported: schema.version,
            });
        }
        if stored < schema.version {
            let txn = self.db.begin_write().map_err(redb_err)?;
            for def in &schema.collections {
                txn.open_table(records_table(def.name)).map_err(redb_err)?;
                for index in &def.indexes {
                    txn.open_multimap_table(index_table(&index_name(def.name, index)))
                        .map_err(redb_err)?;
                    txn.open_table(reverse_table(&reverse_name(def.name, index)))
                        .map_err(redb_err)?;
                }
            }
            {
                let mut meta = txn.open_table(META).map_err(redb_err)?;
                meta.insert(VERSION_KEY, u64::from(schema.version))
                    .map_err(redb_err)?;
            }
            txn.commit().map_err(redb_err)?;
            info!(from = stored, to = schema.version, "upgraded redb schema");
        }

        let mut catalog = self.catalog.write();
        catalog.clear();
        for def in &schema.collections {
            catalog.insert(def.name.to_string(), def.clone());
        }
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        self.def(collection)?;
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(records_table(collection)).map_err(redb_err)?;
        let value = table
            .get(key)
            .map_err(redb_err)?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn put(
        &self,
        collection: &str,
        key: &RecordKey,
        value: &[u8],
        index: &[IndexEntry],
    ) -> Result<(), EngineError> {
        let def = self.def(collection)?;
        check_entries(&def, index)?;
        let encoded = key.encode();

        let txn = self.db.begin_write().map_err(redb_err)?;
        {
            let mut table = txn.open_table(records_table(collection)).map_err(redb_err)?;
            table.insert(encoded.as_str(), value).map_err(redb_err)?;
        }
        if let RecordKey::Id(id) = key {
            if def.auto_id && *id > Self::read_sequence(&txn, collection)? {
                Self::write_sequence(&txn, collection, *id)?;
            }
        }
        Self::reindex(&txn, &def, &encoded, index)?;
        txn.commit().map_err(redb_err)?;
        debug!(collection, key = %encoded, "redb put");
        Ok(())
    }

    fn insert_with_id(
        &self,
        collection: &str,
        index: &[IndexEntry],
        encode: &mut dyn FnMut(u64) -> Result<Vec<u8>, EngineError>,
    ) -> Result<u64, EngineError> {
        let def = self.def(collection)?;
        check_entries(&def, index)?;

        // Dropping the transaction on any error below aborts it, sequence included.
        let txn = self.db.begin_write().map_err(redb_err)?;
        let id = Self::read_sequence(&txn, collection)?
            .checked_add(1)
            .ok_or_else(|| EngineError::SequenceExhausted(collection.to_string()))?;
        let value = encode(id)?;
        let key = id.to_string();
        {
            let mut table = txn.open_table(records_table(collection)).map_err(redb_err)?;
            table.insert(key.as_str(), value.as_slice()).map_err(redb_err)?;
        }
        Self::write_sequence(&txn, collection, id)?;
        Self::reindex(&txn, &def, &key, index)?;
        txn.commit().map_err(redb_err)?;
        debug!(collection, id, "redb insert");
        Ok(id)
    }

    fn remove(&self, collection: &str, key: &str) -> Result<bool, EngineError> {
        let def = self.def(collection)?;
        let txn = self.db.begin_write().map_err(redb_err)?;
        let existed = {
            let mut table = txn.open_table(records_table(collection)).map_err(redb_err)?;
            let removed = table.remove(key).map_err(redb_err)?;
            removed.is_some()
        };
        Self::reindex(&txn, &def, key, &[])?;
        txn.commit().map_err(redb_err)?;
        Ok(existed)
    }

    fn entries(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, EngineError> {
        self.def(collection)?;
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(records_table(collection)).map_err(redb_err)?;
        let mut out = Vec::new();
        for item in table.iter().map_err(redb_err)? {
            let (key, value) = item.map_err(redb_err)?;
            out.push((key.value().to_string(), value.value().to_vec()));
        }
        Ok(out)
    }

    fn keys(&self, collection: &str) -> Result<Vec<String>, EngineError> {
        self.def(collection)?;
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(records_table(collection)).map_err(redb_err)?;
        let mut out = Vec::new();
        for item in table.iter().map_err(redb_err)? {
            let (key, _) = item.map_err(redb_err)?;
            out.push(key.value().to_string());
        }
        Ok(out)
    }

    fn index_lookup(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> Result<Vec<Vec<u8>>, EngineError> {
        let def = self.def(collection)?;
        if !def.has_index(index) {
            return Err(EngineError::MissingIndex {
                collection: collection.to_string(),
                index: index.to_string(),
            });
        }
        let txn = self.db.begin_read().map_err(redb_err)?;
        let forward = txn
            .open_multimap_table(index_table(&index_name(collection, index)))
            .map_err(redb_err)?;
        let records = txn.open_table(records_table(collection)).map_err(redb_err)?;

        let mut out = Vec::new();
        for key in forward.get(value).map_err(redb_err)? {
            let key = key.map_err(redb_err)?;
            if let Some(record) = records.get(key.value()).map_err(redb_err)? {
                out.push(record.value().to_vec());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RedbEngine {
        let engine = RedbEngine::in_memory().unwrap();
        engine.apply_schema(&Schema::current()).unwrap();
        engine
    }

    fn date_entry(value: &str) -> Vec<IndexEntry> {
        vec![IndexEntry {
            index: "date",
            value: value.to_string(),
        }]
    }

    #[test]
    fn fresh_database_reports_version_zero() {
        let engine = RedbEngine::in_memory().unwrap();
        assert_eq!(engine.schema_version().unwrap(), 0);
        engine.apply_schema(&Schema::current()).unwrap();
        assert_eq!(engine.schema_version().unwrap(), Schema::current().version);
    }

    #[test]
    fn put_get_remove_round_trip() {
        let engine = engine();
        let key = RecordKey::from("2024-01-01");
        engine.put("moodLogs", &key, b"{}", &[]).unwrap();
        assert_eq!(
            engine.get("moodLogs", "2024-01-01").unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(engine.keys("moodLogs").unwrap(), vec!["2024-01-01".to_string()]);
        assert!(engine.remove("moodLogs", "2024-01-01").unwrap());
        assert!(!engine.remove("moodLogs", "2024-01-01").unwrap());
        assert!(engine.entries("moodLogs").unwrap().is_empty());
    }

    #[test]
    fn collection_outside_schema_is_missing() {
        let engine = engine();
        assert!(matches!(
            engine.get("unknown", "k"),
            Err(EngineError::MissingCollection(_))
        ));
        assert!(matches!(
            engine.put("unknown", &RecordKey::Id(1), b"x", &[]),
            Err(EngineError::MissingCollection(_))
        ));
    }

    #[test]
    fn ids_are_sequential_and_not_reused() {
        let engine = engine();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(
                engine
                    .insert_with_id("victories", &[], &mut |id| Ok(id.to_string().into_bytes()))
                    .unwrap(),
            );
        }
        assert_eq!(ids, vec![1, 2, 3]);
        engine.remove("victories", "3").unwrap();
        let next = engine
            .insert_with_id("victories", &[], &mut |_| Ok(Vec::new()))
            .unwrap();
        assert_eq!(next, 4);
    }

    #[test]
    fn caller_supplied_id_advances_sequence() {
        let engine = engine();
        engine
            .put("thoughtRecords", &RecordKey::Id(1_700_000_000_000), b"t", &[])
            .unwrap();
        let next = engine
            .insert_with_id("thoughtRecords", &[], &mut |_| Ok(Vec::new()))
            .unwrap();
        assert_eq!(next, 1_700_000_000_001);
    }

    #[test]
    fn exhausted_sequence_refuses_new_ids() {
        let engine = engine();
        engine
            .put("thoughtRecords", &RecordKey::Id(u64::MAX), b"last", &[])
            .unwrap();
        let result = engine.insert_with_id("thoughtRecords", &[], &mut |_| Ok(b"over".to_vec()));
        assert!(matches!(
            result,
            Err(EngineError::SequenceExhausted(name)) if name == "thoughtRecords"
        ));
        assert_eq!(
            engine.keys("thoughtRecords").unwrap(),
            vec![u64::MAX.to_string()]
        );
    }

    #[test]
    fn aborted_insert_leaves_no_trace() {
        let engine = engine();
        let result = engine.insert_with_id("journalEntries", &[], &mut |_| {
            Err(EngineError::InvalidKey("encode failed".into()))
        });
        assert!(result.is_err());
        assert!(engine.keys("journalEntries").unwrap().is_empty());
        let id = engine
            .insert_with_id("journalEntries", &[], &mut |_| Ok(Vec::new()))
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn date_index_tracks_moves_and_removals() {
        let engine = engine();
        engine
            .put("activityLogs", &RecordKey::Id(1), b"a", &date_entry("2024-03-03"))
            .unwrap();
        engine
            .put("activityLogs", &RecordKey::Id(2), b"b", &date_entry("2024-03-03"))
            .unwrap();
        let mut found = engine
            .index_lookup("activityLogs", "date", "2024-03-03")
            .unwrap();
        found.sort();
        assert_eq!(found, vec![b"a".to_vec(), b"b".to_vec()]);

        engine
            .put("activityLogs", &RecordKey::Id(1), b"a2", &date_entry("2024-03-04"))
            .unwrap();
        assert_eq!(
            engine
                .index_lookup("activityLogs", "date", "2024-03-03")
                .unwrap(),
            vec![b"b".to_vec()]
        );

        engine.remove("activityLogs", "1").unwrap();
        assert!(engine
            .index_lookup("activityLogs", "date", "2024-03-04")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn lookup_on_unindexed_collection_fails() {
        let engine = engine();
        assert!(matches!(
            engine.index_lookup("moodLogs", "date", "2024-01-01"),
            Err(EngineError::MissingIndex { .. })
        ));
    }

    #[test]
    fn newer_stored_schema_is_refused() {
        let engine = engine();
        let older = Schema {
            version: 0,
            ..Schema::current()
        };
        assert!(matches!(
            engine.apply_schema(&older),
            Err(EngineError::SchemaTooNew { .. })
        ));
    }

    #[test]
    fn file_database_persists_and_locks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("haven.redb");
        {
            let engine = RedbEngine::open(&path).unwrap();
            engine.apply_schema(&Schema::current()).unwrap();
            engine
                .put("moodLogs", &RecordKey::from("2024-01-01"), b"m", &[])
                .unwrap();

            assert!(matches!(
                RedbEngine::open(&path),
                Err(EngineError::Blocked(_))
            ));
        }

        let engine = RedbEngine::open(&path).unwrap();
        engine.apply_schema(&Schema::current()).unwrap();
        assert_eq!(engine.path(), Some(path.as_path()));
        assert_eq!(
            engine.get("moodLogs", "2024-01-01").unwrap(),
            Some(b"m".to_vec())
        );
    }
}
