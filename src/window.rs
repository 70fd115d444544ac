//! Local-time window arithmetic.
//!
//! Window bounds are carried as `datetime-local` strings (`YYYY-MM-DDTHH:MM`).
//! The format is fixed-width and zero-padded, so ordering two bounds is a
//! plain string comparison.
//!
//! [`shift`] is offset-preserving: the input wall time is resolved to an
//! instant once, and the UTC offset in force at that instant is reused for
//! the result. A shift that crosses a DST transition therefore lands on the
//! wall time the *original* offset would show, which may differ from the
//! wall clock at the destination. Callers rely on this exact arithmetic.

use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone,
    Timelike,
};
use serde::{Deserialize, Serialize};

/// Format used by `datetime-local` inputs and the address bar.
pub const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Format the backend expects for `startdt`/`enddt`.
pub const QUERY_FORMAT: &str = "%Y-%m-%d %H:%M";

const ACCEPTED_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeError {
    #[error("Invalid local datetime '{0}', expected YYYY-MM-DDTHH:MM")]
    Parse(String),

    #[error("Shift of {0} hours is out of range")]
    OutOfRange(f64),
}

/// A (start, end) pair of `datetime-local` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

impl TimeWindow {
    /// `true` when `start <= end`.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }
}

/// Parse a local datetime at minute precision. Seconds, if present, are dropped.
///
/// # Errors
///
/// Returns `TimeError::Parse` if the value matches none of the accepted formats.
pub fn parse_local(value: &str) -> Result<NaiveDateTime, TimeError> {
    let value = value.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(truncate_to_minute)
        .ok_or_else(|| TimeError::Parse(value.to_string()))
}

#[must_use]
pub fn format_local(dt: NaiveDateTime) -> String {
    dt.format(LOCAL_FORMAT).to_string()
}

/// Rewrite a local datetime into the backend's `YYYY-MM-DD HH:MM` form.
///
/// # Errors
///
/// Returns `TimeError::Parse` if `value` is not a local datetime.
pub fn to_query_format(value: &str) -> Result<String, TimeError> {
    Ok(parse_local(value)?.format(QUERY_FORMAT).to_string())
}

/// Today's midnight through one hour later, in `now`'s time zone.
#[must_use]
pub fn default_window<Tz: TimeZone>(now: &DateTime<Tz>) -> TimeWindow {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let start = format_local(midnight);
    let end = match shift_naive(&now.timezone(), midnight, 1.0) {
        Ok(end) => format_local(end),
        Err(e) => {
            // Only reachable at the edge of chrono's calendar
            tracing::warn!(error = %e, start = %start, "Default end out of range, using start");
            start.clone()
        }
    };
    TimeWindow { start, end }
}

/// Shift a local datetime by `hours`, keeping the offset of the input instant.
///
/// # Errors
///
/// Returns `TimeError::Parse` for an unparseable input and
/// `TimeError::OutOfRange` if the result does not fit the calendar.
pub fn shift<Tz: TimeZone>(tz: &Tz, value: &str, hours: f64) -> Result<String, TimeError> {
    shift_naive(tz, parse_local(value)?, hours).map(format_local)
}

fn shift_naive<Tz: TimeZone>(
    tz: &Tz,
    local: NaiveDateTime,
    hours: f64,
) -> Result<NaiveDateTime, TimeError> {
    if !hours.is_finite() {
        return Err(TimeError::OutOfRange(hours));
    }
    #[allow(clippy::cast_possible_truncation)]
    let delta = TimeDelta::try_milliseconds((hours * 3_600_000.0).round() as i64)
        .ok_or(TimeError::OutOfRange(hours))?;

    let instant = local
        .checked_sub_signed(offset_delta(resolve_offset(tz, local)))
        .ok_or(TimeError::OutOfRange(hours))?;
    let offset = tz.offset_from_utc_datetime(&instant).fix();

    instant
        .checked_add_signed(delta)
        .and_then(|utc| utc.checked_add_signed(offset_delta(offset)))
        .and_then(truncate_to_minute)
        .ok_or(TimeError::OutOfRange(hours))
}

fn offset_delta(offset: FixedOffset) -> TimeDelta {
    TimeDelta::seconds(offset.local_minus_utc().into())
}

fn truncate_to_minute(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    dt.with_second(0).and_then(|dt| dt.with_nanosecond(0))
}

/// Offset used to turn a wall time into an instant.
///
/// Ambiguous wall times take the earlier instant. Wall times inside a gap are
/// read with the offset in force before the transition, which moves them
/// forward by the size of the gap.
fn resolve_offset<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> FixedOffset {
    match tz.offset_from_local_datetime(&local) {
        LocalResult::Single(offset) => offset.fix(),
        LocalResult::Ambiguous(earliest, _) => earliest.fix(),
        LocalResult::None => tz
            .offset_from_utc_datetime(&(local - TimeDelta::days(1)))
            .fix(),
    }
}
