//! Sobriety day counting and milestone badges.

use chrono::NaiveDate;

/// Day thresholds that earn a badge, paired with the badge id.
pub const SOBRIETY_MILESTONES: [(i64, &str); 9] = [
    (1, "sober-1d"),
    (3, "sober-3d"),
    (7, "sober-1w"),
    (14, "sober-2w"),
    (30, "sober-1m"),
    (60, "sober-2m"),
    (90, "sober-3m"),
    (180, "sober-6m"),
    (365, "sober-1y"),
];

/// Whole days from `since` to `today`; 0 if `today` is earlier.
#[must_use]
pub fn sober_days(since: NaiveDate, today: NaiveDate) -> i64 {
    (today - since).num_days().max(0)
}

/// Ids of every milestone reached after `days` sober days, smallest first.
#[must_use]
pub fn milestones_reached(days: i64) -> Vec<&'static str> {
    SOBRIETY_MILESTONES
        .iter()
        .take_while(|(threshold, _)| days >= *threshold)
        .map(|(_, id)| *id)
        .collect()
}
