use chrono::{DateTime, Duration, Utc};

use super::errors::ReminderError;

const GOOGLE_CALENDAR_RENDER_URL: &str = "https://calendar.google.com/calendar/render";
const CALENDAR_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Google Calendar "add event" link for a reminder. Without `end` the event
/// lasts one hour.
pub fn build_calendar_url(
    title: &str,
    description: &str,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Result<String, ReminderError> {
    let end = match end {
        Some(end) => end,
        None => start
            .checked_add_signed(Duration::hours(1))
            .ok_or_else(|| ReminderError::TimeOutOfRange {
                input: start.to_rfc3339(),
            })?,
    };
    Ok(format!(
        "{}?action=TEMPLATE&text={}&details={}&dates={}/{}",
        GOOGLE_CALENDAR_RENDER_URL,
        urlencoding::encode(title),
        urlencoding::encode(description),
        start.format(CALENDAR_TIME_FORMAT),
        end.format(CALENDAR_TIME_FORMAT),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_end_is_one_hour_after_start() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let url = build_calendar_url("Standup", "daily sync", start, None).unwrap();
        assert_eq!(
            url,
            "https://calendar.google.com/calendar/render?action=TEMPLATE&text=Standup\
             &details=daily%20sync&dates=20250101T090000/20250101T100000"
        );
    }

    #[test]
    fn explicit_end_and_reserved_characters() {
        let start = Utc.with_ymd_and_hms(2025, 6, 30, 23, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 7, 1, 1, 0, 0).unwrap();
        let url =
            build_calendar_url("Pay rent & bills", "50/50 split?", start, Some(end)).unwrap();
        assert!(url.contains("text=Pay%20rent%20%26%20bills"));
        assert!(url.contains("details=50%2F50%20split%3F"));
        assert!(url.ends_with("dates=20250630T233000/20250701T010000"));
    }

    #[test]
    fn identical_inputs_give_identical_links() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(
            build_calendar_url("a", "b", start, None).unwrap(),
            build_calendar_url("a", "b", start, None).unwrap()
        );
    }

    #[test]
    fn start_at_the_end_of_time_is_an_error() {
        let err = build_calendar_url("a", "b", DateTime::<Utc>::MAX_UTC, None).unwrap_err();
        assert!(matches!(err, ReminderError::TimeOutOfRange { .. }));
    }
}
