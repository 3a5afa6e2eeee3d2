//! The record store: typed per-collection access over a lazily opened engine.
//!
//! [`RecordStore`] is the only interface callers use. It owns the
//! connection lifecycle (one shared connection, opened on first use),
//! applies the [`Schema`], validates records before writing them and turns
//! engine failures into [`StoreError`]s. It never retries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use haven_core::{sort_newest_first, Collection, Record, RecordKey};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::storage::connector::{connector_for, Connector};
use crate::storage::engine::{EngineError, IndexEntry, StorageEngine};
use crate::storage::schema::Schema;

/// Typed local persistence for every collection.
///
/// Construct one per application and share it by reference (or `Arc`).
pub struct RecordStore {
    connector: Arc<dyn Connector>,
    schema: Schema,
    engine: OnceLock<Arc<dyn StorageEngine>>,
    /// Serializes open attempts and remembers the last failure.
    opening: Mutex<Option<StoreError>>,
    /// Number of finished open attempts.
    attempts: AtomicU64,
}

impl RecordStore {
    /// Creates a store for `config`. Nothing is opened until first use.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_connector(connector_for(config))
    }

    /// Creates a store that opens its engine through `connector`.
    #[must_use]
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            schema: Schema::current(),
            engine: OnceLock::new(),
            opening: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    /// Whether the shared connection has been established.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.engine.get().is_some()
    }

    /// Establishes the shared connection if it is not open yet.
    ///
    /// Idempotent. Callers arriving while an attempt is in flight wait for it
    /// and share its outcome, failure included. A caller arriving after a
    /// failed attempt starts a new one.
    pub async fn open(&self) -> Result<&Arc<dyn StorageEngine>, StoreError> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }
        let seen = self.attempts.load(Ordering::SeqCst);
        let mut last_failure = self.opening.lock().await;
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }
        if self.attempts.load(Ordering::SeqCst) != seen {
            if let Some(err) = last_failure.as_ref() {
                return Err(err.clone());
            }
        }

        let result = self.connect().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match result {
            Ok(engine) => {
                *last_failure = None;
                Ok(self.engine.get_or_init(|| engine))
            }
            Err(err) => {
                *last_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    async fn connect(&self) -> Result<Arc<dyn StorageEngine>, StoreError> {
        let target = self.connector.describe();
        let engine = self.connector.connect().await.map_err(|e| {
            warn!(storage = %target, error = %e, "failed to open storage");
            StoreError::from_open(e)
        })?;

        let stored = engine.schema_version().map_err(StoreError::from_open)?;
        if stored < self.schema.version {
            info!(storage = %target, from = stored, to = self.schema.version, "upgrading storage schema");
        }
        engine.apply_schema(&self.schema).map_err(|e| {
            warn!(storage = %target, error = %e, "failed to apply storage schema");
            StoreError::from_open(e)
        })?;

        info!(storage = %target, version = self.schema.version, "record store open");
        Ok(engine)
    }

    // --- Typed access ---

    /// The record stored under `key`, or `None`.
    ///
    /// An empty date key returns `None` without touching storage.
    pub async fn get_by_key<R: Record>(
        &self,
        key: impl Into<RecordKey>,
    ) -> Result<Option<R>, StoreError> {
        let key = key.into();
        self.fetch(R::COLLECTION, &key)
            .await?
            .map(|bytes| decode(R::COLLECTION, &bytes))
            .transpose()
    }

    /// Every record of the collection, in unspecified order.
    pub async fn get_all<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        self.fetch_all(R::COLLECTION)
            .await?
            .iter()
            .map(|bytes| decode(R::COLLECTION, bytes))
            .collect()
    }

    /// Every record of the collection, newest first.
    pub async fn list_recent<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        let mut records = self.get_all::<R>().await?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Every key of the collection, in unspecified order.
    pub async fn get_all_keys<R: Record>(&self) -> Result<Vec<RecordKey>, StoreError> {
        self.get_all_keys_raw(R::COLLECTION).await
    }

    /// Inserts or replaces `record` and returns it as stored.
    ///
    /// An id-keyed record without an id gets the next id of its collection.
    /// The whole record is replaced; fields are never merged.
    pub async fn put<R: Record>(&self, mut record: R) -> Result<R, StoreError> {
        let collection = R::COLLECTION;
        record
            .validate()
            .map_err(|e| StoreError::validation(collection, &e))?;
        let index = index_entries(&record);
        let engine = self.open().await?;

        match record.key() {
            Some(key) => {
                check_key(collection, &key)?;
                let bytes = serde_json::to_vec(&record)
                    .map_err(|e| StoreError::write(collection.name(), e.into()))?;
                engine
                    .put(collection.name(), &key, &bytes, &index)
                    .map_err(|e| StoreError::write(collection.name(), e))?;
                debug!(collection = %collection, key = %key, "put record");
            }
            None => {
                let id = engine
                    .insert_with_id(collection.name(), &index, &mut |id: u64| {
                        record.assign_id(id);
                        serde_json::to_vec(&record).map_err(EngineError::from)
                    })
                    .map_err(|e| StoreError::write(collection.name(), e))?;
                debug!(collection = %collection, id, "added record");
            }
        }
        Ok(record)
    }

    /// Removes the record under `key`. Returns whether one existed.
    ///
    /// Removing an absent key is not an error.
    pub async fn delete_by_key<R: Record>(
        &self,
        key: impl Into<RecordKey>,
    ) -> Result<bool, StoreError> {
        self.delete_raw(R::COLLECTION, &key.into()).await
    }

    /// Every record whose `index` field equals `value`.
    pub async fn get_by_index<R: Record>(
        &self,
        index: &str,
        value: &str,
    ) -> Result<Vec<R>, StoreError> {
        let collection = R::COLLECTION;
        if !collection.indexes().iter().any(|name| *name == index) {
            return Err(StoreError::invalid(
                collection,
                format!("no index named `{index}`"),
            ));
        }
        let engine = self.open().await?;
        engine
            .index_lookup(collection.name(), index, value)
            .map_err(|e| StoreError::read(collection.name(), e))?
            .iter()
            .map(|bytes| decode(collection, bytes))
            .collect()
    }

    // --- Untyped access ---

    /// The record under `key` as JSON, or `None`.
    pub async fn get_raw(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<Option<Value>, StoreError> {
        self.fetch(collection, key)
            .await?
            .map(|bytes| decode(collection, &bytes))
            .transpose()
    }

    /// Every record of `collection` as JSON, in unspecified order.
    pub async fn get_all_raw(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.fetch_all(collection)
            .await?
            .iter()
            .map(|bytes| decode(collection, bytes))
            .collect()
    }

    /// Every key of `collection`, in unspecified order.
    pub async fn get_all_keys_raw(
        &self,
        collection: Collection,
    ) -> Result<Vec<RecordKey>, StoreError> {
        let engine = self.open().await?;
        engine
            .keys(collection.name())
            .map_err(|e| StoreError::read(collection.name(), e))?
            .into_iter()
            .map(|raw| {
                RecordKey::parse_for(collection, &raw).ok_or_else(|| {
                    StoreError::read(collection.name(), EngineError::InvalidKey(raw))
                })
            })
            .collect()
    }

    /// Removes the record under `key` from `collection`. Returns whether one existed.
    pub async fn delete_raw(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<bool, StoreError> {
        if key.is_empty() {
            return Ok(false);
        }
        check_key(collection, key)?;
        let engine = self.open().await?;
        let removed = engine
            .remove(collection.name(), &key.encode())
            .map_err(|e| StoreError::write(collection.name(), e))?;
        debug!(collection = %collection, key = %key, removed, "delete record");
        Ok(removed)
    }

    async fn fetch(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        if key.is_empty() {
            return Ok(None);
        }
        check_key(collection, key)?;
        let engine = self.open().await?;
        engine
            .get(collection.name(), &key.encode())
            .map_err(|e| StoreError::read(collection.name(), e))
    }

    async fn fetch_all(&self, collection: Collection) -> Result<Vec<Vec<u8>>, StoreError> {
        let engine = self.open().await?;
        let entries = engine
            .entries(collection.name())
            .map_err(|e| StoreError::read(collection.name(), e))?;
        Ok(entries.into_iter().map(|(_, value)| value).collect())
    }
}

fn index_entries<R: Record>(record: &R) -> Vec<IndexEntry> {
    R::COLLECTION
        .indexes()
        .iter()
        .copied()
        .filter_map(|name| {
            record.index_value(name).map(|value| IndexEntry {
                index: name,
                value,
            })
        })
        .collect()
}

fn check_key(collection: Collection, key: &RecordKey) -> Result<(), StoreError> {
    if key.kind() == collection.key_kind() {
        Ok(())
    } else {
        Err(StoreError::invalid(
            collection,
            format!("`{key}` is not a valid {} key", collection.key_field()),
        ))
    }
}

fn decode<T: DeserializeOwned>(collection: Collection, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::read(collection.name(), e.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use haven_core::{
        ActivityLog, AlcoholLog, DailyPlan, DailyRoutine, DrinkEntry, JournalEntry, MoodLog,
        PlanTask, RoutineTask, ThoughtRecord, Victory,
    };
    use proptest::prelude::*;

    use super::*;
    use crate::error::AccessMode;
    use crate::storage::connector::MemoryConnector;
    use crate::storage::engines::MemoryStorage;

    /// Counts connection attempts and optionally fails or stalls them.
    struct CountingConnector {
        inner: MemoryConnector,
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl CountingConnector {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryConnector::default(),
                calls: AtomicUsize::new(0),
                fail,
                delay: Duration::from_millis(20),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self) -> Result<Arc<dyn StorageEngine>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(EngineError::Unavailable("no disk".into()));
            }
            self.inner.connect().await
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[cfg(feature = "redb")]
    struct RedbMemoryConnector;

    #[cfg(feature = "redb")]
    #[async_trait]
    impl Connector for RedbMemoryConnector {
        async fn connect(&self) -> Result<Arc<dyn StorageEngine>, EngineError> {
            Ok(Arc::new(crate::storage::engines::RedbEngine::in_memory()?))
        }

        fn describe(&self) -> String {
            "redb-memory".to_string()
        }
    }

    fn memory_store() -> RecordStore {
        RecordStore::with_connector(Arc::new(MemoryConnector::default()))
    }

    /// One store per engine implementation.
    fn stores() -> Vec<RecordStore> {
        #[allow(unused_mut)]
        let mut stores = vec![memory_store()];
        #[cfg(feature = "redb")]
        stores.push(RecordStore::with_connector(Arc::new(RedbMemoryConnector)));
        stores
    }

    fn mood(date: &str, mood: u8, energy: u8, anxiety: u8) -> MoodLog {
        MoodLog {
            date: date.to_string(),
            mood,
            energy,
            anxiety,
        }
    }

    fn activity(date: &str, text: &str) -> ActivityLog {
        ActivityLog {
            id: None,
            date: date.to_string(),
            timestamp: format!("{date}T12:00:00Z"),
            activity_text: text.to_string(),
            linked_values: vec!["health".to_string()],
            enjoyment: Some(6),
            achievement: None,
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn mood_put_replaces_whole_record() {
        for store in stores() {
            store.put(mood("2024-01-01", 3, 2, 1)).await.unwrap();
            store.put(mood("2024-01-01", 5, 1, 3)).await.unwrap();

            let stored: Option<MoodLog> = store.get_by_key("2024-01-01").await.unwrap();
            assert_eq!(stored, Some(mood("2024-01-01", 5, 1, 3)));
            assert_eq!(store.get_all::<MoodLog>().await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn deleted_routine_can_be_defined_again() {
        for store in stores() {
            let routine = DailyRoutine {
                date: "2024-02-02".into(),
                tasks: vec![RoutineTask {
                    id: 0,
                    text: "A".into(),
                    completed: false,
                }],
            };
            store.put(routine).await.unwrap();
            assert!(store
                .delete_by_key::<DailyRoutine>("2024-02-02")
                .await
                .unwrap());
            assert_eq!(
                store
                    .get_by_key::<DailyRoutine>("2024-02-02")
                    .await
                    .unwrap(),
                None
            );

            let fresh = DailyRoutine {
                date: "2024-02-02".into(),
                tasks: Vec::new(),
            };
            store.put(fresh.clone()).await.unwrap();
            assert_eq!(
                store.get_by_key::<DailyRoutine>("2024-02-02").await.unwrap(),
                Some(fresh)
            );
        }
    }

    #[tokio::test]
    async fn activity_log_found_by_date_index() {
        for store in stores() {
            let stored = store.put(activity("2024-03-03", "walk")).await.unwrap();
            store.put(activity("2024-03-04", "swim")).await.unwrap();

            let found: Vec<ActivityLog> = store
                .get_by_index("date", "2024-03-03")
                .await
                .unwrap();
            assert_eq!(found, vec![stored]);
            assert!(store
                .get_by_index::<ActivityLog>("date", "2024-01-01")
                .await
                .unwrap()
                .is_empty());
        }
    }

    #[tokio::test]
    async fn deleting_absent_key_is_a_no_op() {
        for store in stores() {
            store.put(mood("2024-01-01", 3, 2, 1)).await.unwrap();
            assert!(!store.delete_by_key::<MoodLog>("2024-05-05").await.unwrap());
            assert!(!store.delete_by_key::<JournalEntry>(99u64).await.unwrap());
            assert_eq!(
                store.get_all_keys::<MoodLog>().await.unwrap(),
                vec![RecordKey::from("2024-01-01")]
            );
        }
    }

    #[tokio::test]
    async fn all_keys_match_live_dates() {
        for store in stores() {
            for date in ["2024-01-01", "2024-01-02", "2024-01-03"] {
                store
                    .put(AlcoholLog::from_drinks(date, Vec::new()))
                    .await
                    .unwrap();
            }
            store
                .delete_by_key::<AlcoholLog>("2024-01-02")
                .await
                .unwrap();

            let mut keys = store.get_all_keys::<AlcoholLog>().await.unwrap();
            keys.sort();
            assert_eq!(
                keys,
                vec![RecordKey::from("2024-01-01"), RecordKey::from("2024-01-03")]
            );
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_and_never_reused() {
        for store in stores() {
            let first = store
                .put(JournalEntry::new("2024-01-01T08:00:00Z", "first"))
                .await
                .unwrap();
            let second = store
                .put(JournalEntry::new("2024-01-01T09:00:00Z", "second"))
                .await
                .unwrap();
            assert_eq!((first.id, second.id), (Some(1), Some(2)));

            store.delete_by_key::<JournalEntry>(2u64).await.unwrap();
            let third = store
                .put(JournalEntry::new("2024-01-01T10:00:00Z", "third"))
                .await
                .unwrap();
            assert_eq!(third.id, Some(3));
            assert_eq!(
                store.get_by_key::<JournalEntry>(3u64).await.unwrap(),
                Some(third)
            );
        }
    }

    #[tokio::test]
    async fn caller_supplied_thought_record_id_is_kept() {
        for store in stores() {
            let record = ThoughtRecord {
                id: Some(1_700_000_000_000),
                timestamp: "2024-01-01T10:00:00Z".into(),
                situation: "meeting".into(),
                emotions: "anxious".into(),
                auto_thoughts: "I'll fail".into(),
                evidence_for: "late once".into(),
                evidence_against: "on time for months".into(),
                alternative_thought: Some("one slip is normal".into()),
                outcome: None,
            };
            let stored = store.put(record.clone()).await.unwrap();
            assert_eq!(stored, record);
            assert_eq!(
                store
                    .get_by_key::<ThoughtRecord>(1_700_000_000_000u64)
                    .await
                    .unwrap(),
                Some(record)
            );
        }
    }

    #[tokio::test]
    async fn every_record_kind_round_trips() {
        for store in stores() {
            let plan = DailyPlan {
                date: "2024-04-01".into(),
                tasks: vec![PlanTask {
                    id: 1_711_929_600_000,
                    text: "groceries".into(),
                    energy: Some(2),
                    completed: true,
                }],
            };
            store.put(plan.clone()).await.unwrap();
            assert_eq!(
                store.get_by_key::<DailyPlan>("2024-04-01").await.unwrap(),
                Some(plan)
            );

            let victory = store
                .put(Victory::new("2024-04-01T20:00:00Z", "said no"))
                .await
                .unwrap();
            assert_eq!(
                store
                    .get_by_key::<Victory>(victory.id.unwrap())
                    .await
                    .unwrap(),
                Some(victory)
            );

            let log = AlcoholLog::from_drinks(
                "2024-04-01",
                vec![DrinkEntry {
                    type_key: "beer".into(),
                    count: 1,
                    unit_value: 2.3,
                    name: "Pint".into(),
                }],
            );
            store.put(log.clone()).await.unwrap();
            assert_eq!(
                store.get_by_key::<AlcoholLog>("2024-04-01").await.unwrap(),
                Some(log)
            );
        }
    }

    #[tokio::test]
    async fn list_recent_is_newest_first() {
        let store = memory_store();
        for (ts, text) in [
            ("2024-01-02T00:00:00Z", "middle"),
            ("2024-01-03T00:00:00Z", "newest"),
            ("2024-01-01T00:00:00Z", "oldest"),
        ] {
            store.put(Victory::new(ts, text)).await.unwrap();
        }
        let texts: Vec<String> = store
            .list_recent::<Victory>()
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.text)
            .collect();
        assert_eq!(texts, ["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn invalid_records_never_reach_storage() {
        let store = memory_store();
        let err = store.put(mood("", 3, 2, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { ref collection, .. } if collection == "moodLogs"));

        let err = store.put(mood("2024-01-01", 9, 2, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        assert!(store.get_all::<MoodLog>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_id_sequence_is_a_write_failure() {
        for store in stores() {
            let mut last = ThoughtRecord {
                id: Some(u64::MAX),
                timestamp: "2024-01-01T10:00:00Z".into(),
                situation: "meeting".into(),
                emotions: "anxious".into(),
                auto_thoughts: "I'll fail".into(),
                evidence_for: "late once".into(),
                evidence_against: "on time for months".into(),
                alternative_thought: None,
                outcome: None,
            };
            store.put(last.clone()).await.unwrap();

            last.id = None;
            let err = store.put(last).await.unwrap_err();
            assert!(matches!(
                err,
                StoreError::OperationFailed { ref collection, mode: AccessMode::Write, .. }
                    if collection == "thoughtRecords"
            ));
            assert_eq!(store.get_all_keys::<ThoughtRecord>().await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn non_canonical_dates_are_rejected() {
        for store in stores() {
            for date in [" 2024-01-1", "2024-01-1", "2024-01-01 ", "2024-1-01", "2024-01-01Z"] {
                let err = store.put(mood(date, 3, 2, 1)).await.unwrap_err();
                assert!(
                    matches!(err, StoreError::InvalidRecord { .. }),
                    "`{date}` was accepted"
                );
            }
            assert!(store.get_all_keys::<MoodLog>().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn key_of_wrong_kind_is_invalid() {
        let store = memory_store();
        assert!(matches!(
            store.get_by_key::<MoodLog>(5u64).await,
            Err(StoreError::InvalidRecord { .. })
        ));
        assert!(matches!(
            store.delete_by_key::<JournalEntry>("2024-01-01").await,
            Err(StoreError::InvalidRecord { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_index_is_invalid() {
        let store = memory_store();
        assert!(matches!(
            store.get_by_index::<MoodLog>("date", "2024-01-01").await,
            Err(StoreError::InvalidRecord { .. })
        ));
        assert!(matches!(
            store.get_by_index::<ActivityLog>("timestamp", "x").await,
            Err(StoreError::InvalidRecord { .. })
        ));
    }

    #[tokio::test]
    async fn empty_key_short_circuits_without_opening() {
        let connector = CountingConnector::new(true);
        let store = RecordStore::with_connector(connector.clone());

        assert_eq!(store.get_by_key::<MoodLog>("").await.unwrap(), None);
        assert!(!store.delete_by_key::<DailyPlan>("  ").await.unwrap());
        assert_eq!(connector.calls(), 0);
        assert!(!store.is_open());
    }

    #[tokio::test]
    async fn concurrent_opens_share_one_connection_attempt() {
        let connector = CountingConnector::new(false);
        let store = RecordStore::with_connector(connector.clone());

        let (a, b, c) = tokio::join!(store.open(), store.open(), store.open());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(connector.calls(), 1);

        store.open().await.unwrap();
        assert_eq!(connector.calls(), 1);
        assert!(store.is_open());
    }

    #[tokio::test]
    async fn concurrent_callers_share_a_failed_attempt() {
        let connector = CountingConnector::new(true);
        let store = RecordStore::with_connector(connector.clone());

        let (a, b) = tokio::join!(store.open(), store.open());
        assert!(matches!(a, Err(StoreError::StorageUnavailable { .. })));
        assert!(matches!(b, Err(StoreError::StorageUnavailable { .. })));
        assert_eq!(connector.calls(), 1);

        // A later, separate call is a new attempt.
        assert!(store.open().await.is_err());
        assert_eq!(connector.calls(), 2);
    }

    #[tokio::test]
    async fn upgrade_blocked_by_other_connection_fails_visibly() {
        let storage = MemoryStorage::new();
        let other = storage.connect();
        let store =
            RecordStore::with_connector(Arc::new(MemoryConnector::new(storage.clone())));

        let Err(err) = store.open().await else {
            panic!("open should be blocked");
        };
        assert!(err.is_blocked());
        assert!(!store.is_open());

        drop(other);
        store.open().await.unwrap();
        assert!(store.is_open());
    }

    #[tokio::test]
    async fn newer_stored_schema_is_incompatible() {
        let storage = MemoryStorage::new();
        {
            let engine = storage.connect();
            let future = Schema {
                version: Schema::current().version + 1,
                ..Schema::current()
            };
            engine.apply_schema(&future).unwrap();
        }
        let store = RecordStore::with_connector(Arc::new(MemoryConnector::new(storage)));
        assert!(matches!(
            store.open().await,
            Err(StoreError::IncompatibleSchema { .. })
        ));
    }

    #[tokio::test]
    async fn corrupted_record_is_a_read_failure() {
        let store = memory_store();
        let engine = store.open().await.unwrap();
        engine
            .put("moodLogs", &RecordKey::from("2024-01-01"), b"not json", &[])
            .unwrap();

        let err = store
            .get_by_key::<MoodLog>("2024-01-01")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::OperationFailed {
                mode: AccessMode::Read,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn raw_access_mirrors_typed_access() {
        let store = memory_store();
        store.put(mood("2024-01-01", 4, 2, 2)).await.unwrap();

        let key = RecordKey::from("2024-01-01");
        let value = store
            .get_raw(Collection::MoodLogs, &key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value["mood"], 4);
        assert_eq!(store.get_all_raw(Collection::MoodLogs).await.unwrap().len(), 1);
        assert!(store.delete_raw(Collection::MoodLogs, &key).await.unwrap());
        assert!(store.get_raw(Collection::MoodLogs, &key).await.unwrap().is_none());
    }

    #[cfg(feature = "redb")]
    #[tokio::test]
    async fn directory_store_persists_and_blocks_second_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::directory(dir.path());
        {
            let store = RecordStore::new(&config);
            store.put(mood("2024-01-01", 2, 2, 2)).await.unwrap();

            let second = RecordStore::new(&config);
            assert!(matches!(second.open().await, Err(StoreError::BlockedUpgrade)));
        }

        let reopened = RecordStore::new(&config);
        assert_eq!(
            reopened.get_by_key::<MoodLog>("2024-01-01").await.unwrap(),
            Some(mood("2024-01-01", 2, 2, 2))
        );
    }

    proptest! {
        #[test]
        fn every_listed_date_key_resolves(
            month in 1u32..=12,
            day in 1u32..=28,
            padded in any::<bool>(),
            prefix in prop::sample::select(vec!["", " "]),
            suffix in prop::sample::select(vec!["", " ", "Z"]),
        ) {
            let body = if padded {
                format!("2024-{month:02}-{day:02}")
            } else {
                format!("2024-{month}-{day}")
            };
            let date = format!("{prefix}{body}{suffix}");
            let canonical = format!("2024-{month:02}-{day:02}");
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            for store in stores() {
                let (accepted, unresolved) = runtime.block_on(async {
                    let accepted = match store.put(mood(&date, 3, 2, 1)).await {
                        Ok(_) => true,
                        Err(StoreError::InvalidRecord { .. }) => false,
                        Err(other) => panic!("unexpected failure for `{date}`: {other}"),
                    };
                    let mut unresolved = Vec::new();
                    for key in store.get_all_keys::<MoodLog>().await.unwrap() {
                        if store.get_by_key::<MoodLog>(key.clone()).await.unwrap().is_none() {
                            unresolved.push(key.to_string());
                        }
                    }
                    (accepted, unresolved)
                });
                prop_assert_eq!(accepted, date == canonical);
                prop_assert!(unresolved.is_empty(), "unresolved keys {:?}", unresolved);
            }
        }

        #[test]
        fn any_valid_mood_round_trips(
            day in 1u32..=28,
            mood_score in 1u8..=5,
            energy in 1u8..=3,
            anxiety in 1u8..=3,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let record = mood(&format!("2024-02-{day:02}"), mood_score, energy, anxiety);
            let stored = runtime.block_on(async {
                let store = memory_store();
                store.put(record.clone()).await.unwrap();
                store.get_by_key::<MoodLog>(record.date.clone()).await.unwrap()
            });
            prop_assert_eq!(stored, Some(record));
        }

        #[test]
        fn any_journal_text_round_trips(text in "[a-zA-Z0-9 .,!?]{1,64}[a-z]") {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let stored = runtime.block_on(async {
                let store = memory_store();
                let entry = store
                    .put(JournalEntry::new("2024-01-01T00:00:00Z", text.clone()))
                    .await
                    .unwrap();
                let fetched = store
                    .get_by_key::<JournalEntry>(entry.id.unwrap())
                    .await
                    .unwrap();
                (entry, fetched)
            });
            prop_assert_eq!(stored.1, Some(stored.0.clone()));
            prop_assert_eq!(stored.0.text, text);
        }
    }
}
