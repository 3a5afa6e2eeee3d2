//! Collection catalogue and key types shared by every record kind.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar date format used for every date-keyed collection.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// How records of a collection are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Numeric id assigned by the store (or supplied by the caller).
    AutoId,
    /// Calendar date string, at most one record per date.
    Date,
}

/// The independently keyed record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    JournalEntries,
    MoodLogs,
    DailyRoutines,
    DailyPlans,
    Victories,
    ThoughtRecords,
    AlcoholLogs,
    ActivityLogs,
}

impl Collection {
    /// Every collection, in export order.
    pub const ALL: [Collection; 8] = [
        Collection::JournalEntries,
        Collection::MoodLogs,
        Collection::DailyRoutines,
        Collection::DailyPlans,
        Collection::Victories,
        Collection::ThoughtRecords,
        Collection::AlcoholLogs,
        Collection::ActivityLogs,
    ];

    /// Store name of the collection. Also its field name in the export snapshot.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Collection::JournalEntries => "journalEntries",
            Collection::MoodLogs => "moodLogs",
            Collection::DailyRoutines => "dailyRoutines",
            Collection::DailyPlans => "dailyPlans",
            Collection::Victories => "victories",
            Collection::ThoughtRecords => "thoughtRecords",
            Collection::AlcoholLogs => "alcoholLogs",
            Collection::ActivityLogs => "activityLogs",
        }
    }

    /// Name of the record field holding the key.
    #[must_use]
    pub fn key_field(self) -> &'static str {
        match self.key_kind() {
            KeyKind::AutoId => "id",
            KeyKind::Date => "date",
        }
    }

    #[must_use]
    pub fn key_kind(self) -> KeyKind {
        match self {
            Collection::JournalEntries
            | Collection::Victories
            | Collection::ThoughtRecords
            | Collection::ActivityLogs => KeyKind::AutoId,
            Collection::MoodLogs
            | Collection::DailyRoutines
            | Collection::DailyPlans
            | Collection::AlcoholLogs => KeyKind::Date,
        }
    }

    /// Secondary indexes declared on the collection, named after the field they index.
    #[must_use]
    pub fn indexes(self) -> &'static [&'static str] {
        match self {
            Collection::ActivityLogs => &["date"],
            _ => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown collection name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collection: {0}")]
pub struct UnknownCollection(pub String);

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCollection(s.to_string()))
    }
}

/// Primary key of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Id(u64),
    Date(String),
}

impl RecordKey {
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self {
            RecordKey::Id(_) => KeyKind::AutoId,
            RecordKey::Date(_) => KeyKind::Date,
        }
    }

    /// True for keys that can never match a stored record (an empty date).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, RecordKey::Date(d) if d.trim().is_empty())
    }

    /// Parses a textual key according to the collection's key kind.
    ///
    /// The text is taken verbatim so a stored key always maps back to itself.
    /// Returns `None` when an id collection is given a non-numeric key.
    #[must_use]
    pub fn parse_for(collection: Collection, raw: &str) -> Option<Self> {
        match collection.key_kind() {
            KeyKind::AutoId => raw.parse().ok().map(RecordKey::Id),
            KeyKind::Date => Some(RecordKey::Date(raw.to_string())),
        }
    }

    /// Engine-level string form of the key.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            RecordKey::Id(id) => id.to_string(),
            RecordKey::Date(date) => date.clone(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Id(id) => write!(f, "{id}"),
            RecordKey::Date(date) => f.write_str(date),
        }
    }
}

impl From<u64> for RecordKey {
    fn from(id: u64) -> Self {
        RecordKey::Id(id)
    }
}

impl From<&str> for RecordKey {
    fn from(date: &str) -> Self {
        RecordKey::Date(date.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(date: String) -> Self {
        RecordKey::Date(date)
    }
}

impl From<NaiveDate> for RecordKey {
    fn from(date: NaiveDate) -> Self {
        RecordKey::Date(date.format(DATE_FORMAT).to_string())
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    // chrono accepts unpadded fields and surrounding space; only the
    // canonical form may become a key.
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .filter(|date| date.format(DATE_FORMAT).to_string() == s)
}
