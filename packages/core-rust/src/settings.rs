//! Settings keys and list normalization for the flat settings area.

use crate::validation::ValidationError;

/// Key holding the ids of every badge the user has earned.
pub const EARNED_BADGES_KEY: &str = "earnedBadges";
/// Key holding the user's own craving-distraction suggestions.
pub const DISTRACTIONS_KEY: &str = "distractions";
/// Key holding the user's chosen personal values.
pub const PERSONAL_VALUES_KEY: &str = "personalValues";

/// Maximum number of personal values a user can keep.
pub const MAX_PERSONAL_VALUES: usize = 7;

/// Trims every entry and drops empty and duplicate ones, keeping first-seen order.
#[must_use]
pub fn normalize_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let trimmed = item.as_ref().trim();
        if !trimmed.is_empty() && !out.iter().any(|seen| seen == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Normalizes a personal-values list and enforces [`MAX_PERSONAL_VALUES`].
pub fn normalize_personal_values<I, S>(items: I) -> Result<Vec<String>, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let values = normalize_list(items);
    if values.len() > MAX_PERSONAL_VALUES {
        return Err(ValidationError::TooManyEntries {
            max: MAX_PERSONAL_VALUES,
            found: values.len(),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn normalize_drops_blank_and_duplicate_entries() {
        assert_eq!(normalize_list(["a", " a ", "", "b"]), vec!["a", "b"]);
    }

    #[test]
    fn normalize_keeps_first_seen_order() {
        assert_eq!(
            normalize_list(["walk", "call a friend", " walk", "tea"]),
            vec!["walk", "call a friend", "tea"]
        );
    }

    #[test]
    fn personal_values_capped_at_seven() {
        let seven: Vec<String> = (0..7).map(|i| format!("v{i}")).collect();
        assert_eq!(normalize_personal_values(&seven).unwrap().len(), 7);

        let mut eight = seven.clone();
        eight.push("v7".into());
        assert_eq!(
            normalize_personal_values(&eight),
            Err(ValidationError::TooManyEntries { max: 7, found: 8 })
        );

        // Duplicates collapse before the cap is checked.
        let mut with_dup = seven;
        with_dup.push(" v0 ".into());
        assert!(normalize_personal_values(&with_dup).is_ok());
    }

    proptest! {
        #[test]
        fn normalized_entries_are_unique_trimmed_and_non_empty(
            items in proptest::collection::vec("[ a-c]{0,4}", 0..20)
        ) {
            let out = normalize_list(&items);
            for (i, entry) in out.iter().enumerate() {
                prop_assert!(!entry.is_empty());
                prop_assert_eq!(entry.trim(), entry.as_str());
                prop_assert!(!out[i + 1..].contains(entry));
            }
            prop_assert_eq!(normalize_list(&out), out.clone());
        }
    }
}
