//! Field-level checks applied to records before they are stored.

use crate::types::parse_date;

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing key field `{0}`")]
    MissingKey(&'static str),
    #[error("`{0}` is not a YYYY-MM-DD date")]
    InvalidDate(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("`{field}` is {value}, expected {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },
    #[error("too many tasks: {found} (at most {max})")]
    TooManyTasks { max: usize, found: usize },
    #[error("`{0}` must be a finite, non-negative number of units")]
    InvalidUnits(&'static str),
    #[error("too many entries: {found} (at most {max})")]
    TooManyEntries { max: usize, found: usize },
}

pub(crate) fn require_date(date: &str) -> Result<(), ValidationError> {
    if date.trim().is_empty() {
        return Err(ValidationError::MissingKey("date"));
    }
    match parse_date(date) {
        Some(_) => Ok(()),
        None => Err(ValidationError::InvalidDate(date.to_string())),
    }
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

pub(crate) fn check_range(
    field: &'static str,
    value: u8,
    min: u8,
    max: u8,
) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
