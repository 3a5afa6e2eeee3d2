//! `Haven` Core: record shapes, collection catalogue, validation, and the export snapshot.

pub mod milestones;
pub mod records;
pub mod settings;
pub mod snapshot;
pub mod types;
pub mod validation;

pub use records::{
    sort_newest_first, ActivityLog, AlcoholLog, DailyPlan, DailyRoutine, DrinkEntry,
    JournalEntry, MoodLog, PlanTask, Record, RoutineTask, ThoughtRecord, Victory,
};
pub use snapshot::{ExportSnapshot, SnapshotSettings};
pub use types::{parse_date, Collection, KeyKind, RecordKey, UnknownCollection};
pub use validation::ValidationError;
