use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

use super::errors::ReminderError;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Parses an ISO-8601 timestamp as received at the HTTP boundary.
///
/// A trailing `Z` is read as `+00:00`. Timestamps without an offset and bare
/// dates are taken as UTC. Years outside 1..=9999 are rejected.
pub fn parse_iso_datetime(input: &str) -> Result<DateTime<Utc>, ReminderError> {
    let parsed = parse_any_form(input)?;
    if !SUPPORTED_YEARS.contains(&parsed.year()) {
        return Err(ReminderError::TimeOutOfRange {
            input: input.to_string(),
        });
    }
    Ok(parsed)
}

fn parse_any_form(input: &str) -> Result<DateTime<Utc>, ReminderError> {
    let trimmed = input.trim();
    let normalized = match trimmed.strip_suffix('Z').or_else(|| trimmed.strip_suffix('z')) {
        Some(prefix) => format!("{}+00:00", prefix),
        None => trimmed.to_string(),
    };

    let mut last_err = match DateTime::parse_from_rfc3339(&normalized) {
        Ok(value) => return Ok(value.with_timezone(&Utc)),
        Err(err) => err,
    };
    for format in OFFSET_FORMATS {
        match DateTime::parse_from_str(&normalized, format) {
            Ok(value) => return Ok(value.with_timezone(&Utc)),
            Err(err) => last_err = err,
        }
    }
    for format in NAIVE_FORMATS {
        match NaiveDateTime::parse_from_str(&normalized, format) {
            Ok(value) => return Ok(value.and_utc()),
            Err(err) => last_err = err,
        }
    }
    match NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        Ok(date) => {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc());
            }
        }
        Err(err) => last_err = err,
    }

    Err(ReminderError::InvalidTime {
        input: input.to_string(),
        source: last_err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn accepts_zulu_offset_and_naive_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(parse_iso_datetime("2025-01-01T09:00:00Z").unwrap(), expected);
        assert_eq!(parse_iso_datetime("2025-01-01T09:00:00+00:00").unwrap(), expected);
        assert_eq!(parse_iso_datetime("2025-01-01T11:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_iso_datetime("2025-01-01T09:00:00").unwrap(), expected);
        assert_eq!(parse_iso_datetime("2025-01-01T09:00").unwrap(), expected);
        assert_eq!(parse_iso_datetime(" 2025-01-01 09:00:00 ").unwrap(), expected);
        assert_eq!(
            parse_iso_datetime("2025-01-01T09:00:00.250Z").unwrap(),
            expected + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn bare_date_is_midnight_utc() {
        assert_eq!(
            parse_iso_datetime("2025-03-04").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_iso_datetime("tomorrow at nine").unwrap_err();
        assert!(matches!(
            err,
            ReminderError::InvalidTime { ref input, .. } if input == "tomorrow at nine"
        ));
        assert!(parse_iso_datetime("").is_err());
        assert!(parse_iso_datetime("2025-13-01T09:00:00Z").is_err());
    }

    #[test]
    fn far_future_and_ancient_years_are_rejected() {
        assert!(parse_iso_datetime("+262142-12-31T23:30:00").is_err());
        for input in ["+10000-01-01T00:00:00Z", "0000-06-01T00:00:00"] {
            let err = parse_iso_datetime(input).unwrap_err();
            assert!(
                matches!(err, ReminderError::TimeOutOfRange { .. }),
                "{} gave {:?}",
                input,
                err
            );
        }
        assert!(parse_iso_datetime("9999-12-31T23:00:00Z").is_ok());
    }
}
