use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

use super::types::{JobStoreError, Recurrence};

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            Recurrence::Daily => Duration::days(1),
            Recurrence::Weekly => Duration::days(7),
            Recurrence::Monthly => Duration::days(30),
        }
    }
}

impl FromStr for Recurrence {
    type Err = JobStoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            _ => Err(JobStoreError::UnknownRecurrence(value.to_string())),
        }
    }
}

/// First tick of a recurring job registered at `now`: the start time itself
/// when it is still ahead, otherwise the next interval boundary after `now`.
/// `None` when that boundary is past the representable range.
pub(crate) fn first_fire_time(
    start_time: DateTime<Utc>,
    recurrence: Recurrence,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if start_time >= now {
        Some(start_time)
    } else {
        next_fire_after(start_time, recurrence, now)
    }
}

/// Smallest `anchor + k * interval` (k >= 0) strictly after `after`, or
/// `None` on overflow.
///
/// Ticks missed while the store was stopped or saturated coalesce into one.
pub(crate) fn next_fire_after(
    anchor: DateTime<Utc>,
    recurrence: Recurrence,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if anchor > after {
        return Some(anchor);
    }
    let interval_secs = recurrence.interval().num_seconds();
    let behind_secs = (after - anchor).num_seconds();
    let steps = behind_secs / interval_secs + 1;
    let offset = Duration::try_seconds(interval_secs.checked_mul(steps)?)?;
    anchor.checked_add_signed(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_fire_skips_to_first_boundary_after() {
        let anchor = Utc.with_ymd_and_hms(2031, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(
            next_fire_after(anchor, Recurrence::Weekly, anchor),
            Some(anchor + Duration::days(7))
        );
        assert_eq!(
            next_fire_after(anchor, Recurrence::Daily, anchor + Duration::hours(49)),
            Some(anchor + Duration::days(3))
        );
    }

    #[test]
    fn boundary_past_the_calendar_is_none() {
        let anchor = DateTime::<Utc>::MAX_UTC - Duration::days(3);
        assert_eq!(next_fire_after(anchor, Recurrence::Monthly, anchor), None);
        assert_eq!(
            first_fire_time(anchor, Recurrence::Weekly, DateTime::<Utc>::MAX_UTC),
            None
        );
    }
}
