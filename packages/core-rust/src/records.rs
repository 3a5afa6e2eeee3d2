//! Record shapes for every collection and the [`Record`] trait that binds a
//! shape to its collection, key and validation rules.
//!
//! Field names serialize in camelCase so exported snapshots keep the shape
//! the app has always written.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{Collection, RecordKey};
use crate::validation::{check_range, require_date, require_text, ValidationError};

/// Maximum number of tasks in a daily routine.
pub const MAX_ROUTINE_TASKS: usize = 3;

/// A value persisted in one collection.
///
/// The store only ever replaces whole records: callers read, mutate in
/// memory, and `put` the record back.
pub trait Record:
    Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync + 'static
{
    /// Collection this record kind lives in.
    const COLLECTION: Collection;

    /// Primary key, or `None` for an id-keyed record not yet stored.
    fn key(&self) -> Option<RecordKey>;

    /// Stores a freshly assigned id. No-op for date-keyed records.
    fn assign_id(&mut self, _id: u64) {}

    /// Value of the named secondary index field, if the record is indexed by it.
    fn index_value(&self, _index: &str) -> Option<String> {
        None
    }

    /// Timestamp or date used to order records newest first.
    fn sort_key(&self) -> &str;

    /// Checks field constraints before the record reaches storage.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// A free-text journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub timestamp: String,
    pub text: String,
}

impl JournalEntry {
    #[must_use]
    pub fn new(timestamp: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: timestamp.into(),
            text: text.into(),
        }
    }
}

impl Record for JournalEntry {
    const COLLECTION: Collection = Collection::JournalEntries;

    fn key(&self) -> Option<RecordKey> {
        self.id.map(RecordKey::Id)
    }

    fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn sort_key(&self) -> &str {
        &self.timestamp
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("timestamp", &self.timestamp)?;
        require_text("text", &self.text)
    }
}

/// One mood check-in per calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodLog {
    pub date: String,
    /// 1 (very low) to 5 (very good).
    pub mood: u8,
    /// 1 to 3.
    pub energy: u8,
    /// 1 to 3.
    pub anxiety: u8,
}

impl Record for MoodLog {
    const COLLECTION: Collection = Collection::MoodLogs;

    fn key(&self) -> Option<RecordKey> {
        Some(RecordKey::Date(self.date.clone()))
    }

    fn sort_key(&self) -> &str {
        &self.date
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_date(&self.date)?;
        check_range("mood", self.mood, 1, 5)?;
        check_range("energy", self.energy, 1, 3)?;
        check_range("anxiety", self.anxiety, 1, 3)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineTask {
    pub id: u32,
    pub text: String,
    pub completed: bool,
}

/// The (at most three) tasks chosen for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRoutine {
    pub date: String,
    pub tasks: Vec<RoutineTask>,
}

impl Record for DailyRoutine {
    const COLLECTION: Collection = Collection::DailyRoutines;

    fn key(&self) -> Option<RecordKey> {
        Some(RecordKey::Date(self.date.clone()))
    }

    fn sort_key(&self) -> &str {
        &self.date
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_date(&self.date)?;
        if self.tasks.len() > MAX_ROUTINE_TASKS {
            return Err(ValidationError::TooManyTasks {
                max: MAX_ROUTINE_TASKS,
                found: self.tasks.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTask {
    pub id: u64,
    pub text: String,
    /// Energy the task needs, 1 to 3, or `null` when unrated.
    pub energy: Option<u8>,
    pub completed: bool,
}

/// Planner tasks for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlan {
    pub date: String,
    pub tasks: Vec<PlanTask>,
}

impl Record for DailyPlan {
    const COLLECTION: Collection = Collection::DailyPlans;

    fn key(&self) -> Option<RecordKey> {
        Some(RecordKey::Date(self.date.clone()))
    }

    fn sort_key(&self) -> &str {
        &self.date
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_date(&self.date)?;
        for task in &self.tasks {
            if let Some(energy) = task.energy {
                check_range("tasks.energy", energy, 1, 3)?;
            }
        }
        Ok(())
    }
}

/// A small win the user wants to remember.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Victory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub timestamp: String,
    pub text: String,
}

impl Victory {
    #[must_use]
    pub fn new(timestamp: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: timestamp.into(),
            text: text.into(),
        }
    }
}

impl Record for Victory {
    const COLLECTION: Collection = Collection::Victories;

    fn key(&self) -> Option<RecordKey> {
        self.id.map(RecordKey::Id)
    }

    fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn sort_key(&self) -> &str {
        &self.timestamp
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("timestamp", &self.timestamp)?;
        require_text("text", &self.text)
    }
}

/// A cognitive-restructuring worksheet.
///
/// Callers usually supply the id themselves (a millisecond timestamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub timestamp: String,
    pub situation: String,
    pub emotions: String,
    pub auto_thoughts: String,
    pub evidence_for: String,
    pub evidence_against: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_thought: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl Record for ThoughtRecord {
    const COLLECTION: Collection = Collection::ThoughtRecords;

    fn key(&self) -> Option<RecordKey> {
        self.id.map(RecordKey::Id)
    }

    fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn sort_key(&self) -> &str {
        &self.timestamp
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("timestamp", &self.timestamp)?;
        require_text("situation", &self.situation)?;
        require_text("emotions", &self.emotions)?;
        require_text("autoThoughts", &self.auto_thoughts)?;
        require_text("evidenceFor", &self.evidence_for)?;
        require_text("evidenceAgainst", &self.evidence_against)
    }
}

/// One kind of drink logged on a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrinkEntry {
    pub type_key: String,
    pub count: u32,
    /// Alcohol units in a single drink of this kind.
    pub unit_value: f64,
    pub name: String,
}

impl DrinkEntry {
    /// Units contributed by this entry (`count * unit_value`).
    #[must_use]
    pub fn units(&self) -> f64 {
        f64::from(self.count) * self.unit_value
    }
}

/// Alcohol consumed on one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlcoholLog {
    pub date: String,
    pub total_units: f64,
    pub drinks: Vec<DrinkEntry>,
}

impl AlcoholLog {
    /// Builds a log whose total is the sum of its drinks' units.
    #[must_use]
    pub fn from_drinks(date: impl Into<String>, drinks: Vec<DrinkEntry>) -> Self {
        let total_units = drinks.iter().map(DrinkEntry::units).sum();
        Self {
            date: date.into(),
            total_units,
            drinks,
        }
    }
}

impl Record for AlcoholLog {
    const COLLECTION: Collection = Collection::AlcoholLogs;

    fn key(&self) -> Option<RecordKey> {
        Some(RecordKey::Date(self.date.clone()))
    }

    fn sort_key(&self) -> &str {
        &self.date
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_date(&self.date)?;
        if !self.total_units.is_finite() || self.total_units < 0.0 {
            return Err(ValidationError::InvalidUnits("totalUnits"));
        }
        if self
            .drinks
            .iter()
            .any(|d| !d.unit_value.is_finite() || d.unit_value < 0.0)
        {
            return Err(ValidationError::InvalidUnits("drinks.unitValue"));
        }
        Ok(())
    }
}

/// An activity done on a day, linked to the user's personal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub date: String,
    pub timestamp: String,
    pub activity_text: String,
    #[serde(default)]
    pub linked_values: Vec<String>,
    /// 0 to 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enjoyment: Option<u8>,
    /// 0 to 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievement: Option<u8>,
    /// Any other ratings the app attached, kept as written.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record for ActivityLog {
    const COLLECTION: Collection = Collection::ActivityLogs;

    fn key(&self) -> Option<RecordKey> {
        self.id.map(RecordKey::Id)
    }

    fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn index_value(&self, index: &str) -> Option<String> {
        (index == "date").then(|| self.date.clone())
    }

    fn sort_key(&self) -> &str {
        &self.timestamp
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_date(&self.date)?;
        require_text("timestamp", &self.timestamp)?;
        require_text("activityText", &self.activity_text)?;
        if let Some(enjoyment) = self.enjoyment {
            check_range("enjoyment", enjoyment, 0, 10)?;
        }
        if let Some(achievement) = self.achievement {
            check_range("achievement", achievement, 0, 10)?;
        }
        Ok(())
    }
}

/// Sorts records newest first by their [`Record::sort_key`].
pub fn sort_newest_first<R: Record>(records: &mut [R]) {
    records.sort_by(|a, b| b.sort_key().cmp(a.sort_key()));
}
