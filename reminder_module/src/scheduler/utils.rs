use chrono::{DateTime, Utc};

use super::types::{JobStoreError, Trigger};

pub(crate) fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub(crate) fn parse_datetime(value: &str) -> Result<DateTime<Utc>, JobStoreError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

pub(crate) fn parse_optional_datetime(
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, JobStoreError> {
    match value {
        Some(raw) => Ok(Some(parse_datetime(raw)?)),
        None => Ok(None),
    }
}

/// (trigger_type, fire_time, start_time, recurrence, next_fire_time)
pub(crate) fn trigger_columns(
    trigger: &Trigger,
) -> (
    &'static str,
    Option<String>,
    Option<String>,
    Option<&'static str>,
    String,
) {
    match trigger {
        Trigger::OneShot { fire_time } => (
            "one_shot",
            Some(format_datetime(*fire_time)),
            None,
            None,
            format_datetime(*fire_time),
        ),
        Trigger::Recurring {
            start_time,
            recurrence,
            next_fire_time,
        } => (
            "recurring",
            None,
            Some(format_datetime(*start_time)),
            Some(recurrence.as_str()),
            format_datetime(*next_fire_time),
        ),
    }
}
