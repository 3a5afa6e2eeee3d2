//! Full-data export and import.

use std::collections::BTreeMap;

use haven_core::{
    ActivityLog, AlcoholLog, DailyPlan, DailyRoutine, ExportSnapshot, JournalEntry, MoodLog,
    Record, SnapshotSettings, ThoughtRecord, Victory,
};
use tracing::info;

use crate::error::StoreError;
use crate::settings::Settings;
use crate::storage::{EngineError, RecordStore};

/// What [`import_snapshot`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub records: usize,
    pub settings_lists: usize,
}

/// Reads every collection and the settings lists into one snapshot.
pub async fn export_snapshot(
    store: &RecordStore,
    settings: &Settings,
) -> Result<ExportSnapshot, StoreError> {
    let snapshot = ExportSnapshot {
        journal_entries: store.get_all::<JournalEntry>().await?,
        mood_logs: by_date::<MoodLog>(store).await?,
        daily_routines: by_date::<DailyRoutine>(store).await?,
        daily_plans: by_date::<DailyPlan>(store).await?,
        victories: store.get_all::<Victory>().await?,
        thought_records: store.get_all::<ThoughtRecord>().await?,
        alcohol_logs: by_date::<AlcoholLog>(store).await?,
        activity_logs: store.get_all::<ActivityLog>().await?,
        settings: SnapshotSettings {
            earned_badges: settings.earned_badges()?,
            personal_values: settings.personal_values()?,
        },
        distractions: settings.distractions()?,
    };
    info!(records = snapshot.record_count(), "exported snapshot");
    Ok(snapshot)
}

/// A listed key that no longer resolves is a read failure, never a silent gap.
async fn by_date<R: Record>(store: &RecordStore) -> Result<BTreeMap<String, R>, StoreError> {
    let mut out = BTreeMap::new();
    for key in store.get_all_keys::<R>().await? {
        let Some(record) = store.get_by_key::<R>(key.clone()).await? else {
            return Err(StoreError::read(
                R::COLLECTION.name(),
                EngineError::InvalidKey(key.to_string()),
            ));
        };
        out.insert(key.to_string(), record);
    }
    Ok(out)
}

/// Writes every record of `snapshot` back and replaces the settings lists.
///
/// Records keep their ids; records already stored under the same key are
/// replaced. Stops at the first failure, leaving earlier writes in place.
pub async fn import_snapshot(
    store: &RecordStore,
    settings: &Settings,
    snapshot: &ExportSnapshot,
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();

    summary.records += put_all(store, snapshot.journal_entries.iter()).await?;
    summary.records += put_all(store, snapshot.mood_logs.values()).await?;
    summary.records += put_all(store, snapshot.daily_routines.values()).await?;
    summary.records += put_all(store, snapshot.daily_plans.values()).await?;
    summary.records += put_all(store, snapshot.victories.iter()).await?;
    summary.records += put_all(store, snapshot.thought_records.iter()).await?;
    summary.records += put_all(store, snapshot.alcohol_logs.values()).await?;
    summary.records += put_all(store, snapshot.activity_logs.iter()).await?;

    settings.save_earned_badges(&snapshot.settings.earned_badges)?;
    settings.save_personal_values(&snapshot.settings.personal_values)?;
    settings.save_distractions(&snapshot.distractions)?;
    summary.settings_lists = 3;

    info!(records = summary.records, "imported snapshot");
    Ok(summary)
}

async fn put_all<'a, R: Record>(
    store: &RecordStore,
    records: impl Iterator<Item = &'a R>,
) -> Result<usize, StoreError> {
    let mut count = 0;
    for record in records {
        store.put(record.clone()).await?;
        count += 1;
    }
    Ok(count)
}
