//! Time ranges, stored-timestamp conversion and time-lag arithmetic.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use catchdb_error::{CatchError, Result};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Formats accepted when reading a stored timestamp.
const STORED_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Format used when binding a timestamp.
const BIND_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Closed time interval `[start, end]` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, swapping the bounds if given in reverse.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// Years 1 to 9999, a day clear of either end so that the stored text
    /// keeps four-digit years (and sorts chronologically) in any zone.
    #[must_use]
    pub fn unbounded() -> Self {
        let start = Utc.with_ymd_and_hms(1, 1, 2, 0, 0, 0).single();
        let end = Utc.with_ymd_and_hms(9999, 12, 30, 23, 59, 59).single();
        match (start, end) {
            (Some(start), Some(end)) => Self { start, end },
            _ => Self::at(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    /// Degenerate range covering one instant.
    #[must_use]
    pub const fn at(instant: DateTime<Utc>) -> Self {
        Self {
            start: instant,
            end: instant,
        }
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Smallest range containing both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Overlap of both ranges, or `None` when disjoint.
    #[must_use]
    pub fn intersection(self, other: Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Self { start, end })
    }
}

/// Signed number of whole days from `captured_at` to `measured_at`,
/// rounded toward negative infinity.
///
/// A measurement taken six hours before the catch lies on day -1, not 0.
#[must_use]
pub fn time_lag_days(captured_at: DateTime<Utc>, measured_at: DateTime<Utc>) -> i32 {
    let millis = (measured_at - captured_at).num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    i32::try_from(days).unwrap_or(if days < 0 { i32::MIN } else { i32::MAX })
}

/// Read a timestamp stored in the database's local time and normalize it
/// to UTC.
pub fn parse_stored_timestamp(text: &str, zone: FixedOffset) -> Result<DateTime<Utc>> {
    let trimmed = text.trim();
    let naive = STORED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| CatchError::InvalidTimestamp {
            text: text.to_owned(),
        })?;
    zone.from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| CatchError::InvalidTimestamp {
            text: text.to_owned(),
        })
}

/// Render a UTC timestamp in the database's local time for binding.
#[must_use]
pub fn format_stored_timestamp(instant: DateTime<Utc>, zone: FixedOffset) -> String {
    instant.with_timezone(&zone).format(BIND_FORMAT).to_string()
}
