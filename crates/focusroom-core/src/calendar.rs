//! Calendar math in the canonical reference timezone.
//!
//! Day boundaries, streak gaps and hour-of-day buckets are all computed in a
//! single configured offset, never in the host's local time.

use std::fmt;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreError, Result};
use crate::score::round_half_up;

/// The timezone every calendar-date computation is done in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalZone {
    offset: FixedOffset,
}

impl CanonicalZone {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Build a zone from an offset east of UTC, in minutes.
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ConfigError> {
        FixedOffset::east_opt(minutes * 60)
            .map(|offset| Self { offset })
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "calendar.utc_offset".into(),
                message: format!("offset of {minutes} minutes is out of range"),
            })
    }

    /// Parse `"Z"`, `"UTC"`, `"+09:00"`, `"-0530"` or `"+9"`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: "calendar.utc_offset".into(),
            message: format!("'{raw}' is not a UTC offset like +09:00"),
        };

        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
            return Ok(Self::utc());
        }

        let (sign, rest) = if let Some(rest) = trimmed.strip_prefix('+') {
            (1, rest)
        } else if let Some(rest) = trimmed.strip_prefix('-') {
            (-1, rest)
        } else {
            return Err(invalid());
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let (hours, minutes) = match digits.len() {
            1 | 2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
            4 => (
                digits[..2].parse::<i32>().map_err(|_| invalid())?,
                digits[2..].parse::<i32>().map_err(|_| invalid())?,
            ),
            _ => return Err(invalid()),
        };
        if hours > 14 || minutes > 59 {
            return Err(invalid());
        }
        Self::from_offset_minutes(sign * (hours * 60 + minutes))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date of `at` in this zone.
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Hour of day (0-23) of `at` in this zone.
    pub fn hour_of(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&self.offset).hour()
    }

    /// The UTC instant at which `date` begins in this zone.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&(local_midnight - shift))
    }
}

impl Default for CanonicalZone {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for CanonicalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.offset)
    }
}

/// Half-open range of calendar dates, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.len_days().max(0)).map(move |offset| start + Duration::days(offset))
    }

    /// UTC instants bounding this range in `zone`.
    pub fn to_instants(&self, zone: &CanonicalZone) -> (DateTime<Utc>, DateTime<Utc>) {
        (zone.start_of_day(self.start), zone.start_of_day(self.end))
    }
}

/// Whole-day difference `to - from`.
pub fn day_gap(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Elapsed whole minutes between two instants, rounded to nearest.
///
/// Returns [`CoreError::ClockAnomaly`] when `end` precedes `start`.
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u32> {
    let millis = (end - start).num_milliseconds();
    if millis < 0 {
        return Err(CoreError::ClockAnomaly(format!(
            "end {end} precedes start {start} by {}ms",
            -millis
        )));
    }
    let minutes = round_half_up(millis as f64 / 60_000.0);
    Ok(u32::try_from(minutes as i64).unwrap_or(u32::MAX))
}

/// Like [`elapsed_minutes`] but clamps an anomaly to zero and logs it.
pub fn elapsed_minutes_clamped(start: DateTime<Utc>, end: DateTime<Utc>) -> (u32, bool) {
    match elapsed_minutes(start, end) {
        Ok(minutes) => (minutes, false),
        Err(err) => {
            tracing::warn!(%start, %end, error = %err, "negative elapsed time clamped to zero");
            (0, true)
        }
    }
}
