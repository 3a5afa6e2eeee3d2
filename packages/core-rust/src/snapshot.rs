//! Shape of the full-data export.
//!
//! One field per collection; date-keyed collections are objects keyed by
//! date string, id-keyed collections are arrays.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::{
    ActivityLog, AlcoholLog, DailyPlan, DailyRoutine, JournalEntry, MoodLog, ThoughtRecord,
    Victory,
};

/// Settings lists carried in an export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSettings {
    #[serde(default)]
    pub earned_badges: Vec<String>,
    #[serde(default)]
    pub personal_values: Vec<String>,
}

/// Everything the user has stored, as written to an export file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    #[serde(default)]
    pub journal_entries: Vec<JournalEntry>,
    #[serde(default)]
    pub mood_logs: BTreeMap<String, MoodLog>,
    #[serde(default)]
    pub daily_routines: BTreeMap<String, DailyRoutine>,
    #[serde(default)]
    pub daily_plans: BTreeMap<String, DailyPlan>,
    #[serde(default)]
    pub victories: Vec<Victory>,
    #[serde(default)]
    pub thought_records: Vec<ThoughtRecord>,
    #[serde(default)]
    pub alcohol_logs: BTreeMap<String, AlcoholLog>,
    #[serde(default)]
    pub activity_logs: Vec<ActivityLog>,
    #[serde(default)]
    pub settings: SnapshotSettings,
    #[serde(default)]
    pub distractions: Vec<String>,
}

impl ExportSnapshot {
    /// Total number of records across all collections.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.journal_entries.len()
            + self.mood_logs.len()
            + self.daily_routines.len()
            + self.daily_plans.len()
            + self.victories.len()
            + self.thought_records.len()
            + self.alcohol_logs.len()
            + self.activity_logs.len()
    }
}
