use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta};

use crate::directory::LocationId;
use crate::window::{self, TimeError};

/// Smallest and largest hour count the legacy hours picker offers.
pub const ADD_HOURS_RANGE: std::ops::RangeInclusive<u32> = 1..=32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// `locid`, `startdt`, `enddt`
    Range,
    /// `locid`, `date`, `time`, `addhrs`
    Legacy,
}

impl FromStr for QueryShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "range" | "startend" => Ok(Self::Range),
            "legacy" | "addhrs" => Ok(Self::Legacy),
            other => Err(other.to_string()),
        }
    }
}

/// A validated `/hiresgrid` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridQuery {
    Range {
        locid: LocationId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    Legacy {
        locid: LocationId,
        start: NaiveDateTime,
        add_hours: u32,
    },
}

impl GridQuery {
    /// Build a range query from two local datetimes.
    ///
    /// # Errors
    ///
    /// Returns `TimeError::Parse` if either bound is not a local datetime.
    pub fn range(locid: LocationId, start: &str, end: &str) -> Result<Self, TimeError> {
        Ok(Self::Range {
            locid,
            start: window::parse_local(start)?,
            end: window::parse_local(end)?,
        })
    }

    /// Build a legacy query from a start datetime and an hour count.
    ///
    /// # Errors
    ///
    /// Returns `TimeError::Parse` if `start` is not a local datetime.
    pub fn legacy(locid: LocationId, start: &str, add_hours: u32) -> Result<Self, TimeError> {
        Ok(Self::Legacy {
            locid,
            start: window::parse_local(start)?,
            add_hours,
        })
    }

    #[must_use]
    pub fn locid(&self) -> &LocationId {
        match self {
            Self::Range { locid, .. } | Self::Legacy { locid, .. } => locid,
        }
    }

    /// Last wall-clock minute the query covers.
    #[must_use]
    pub fn end(&self) -> NaiveDateTime {
        match self {
            Self::Range { end, .. } => *end,
            Self::Legacy {
                start, add_hours, ..
            } => *start + TimeDelta::hours(i64::from(*add_hours)),
        }
    }

    /// Query-string pairs for `/hiresgrid`.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Range { locid, start, end } => vec![
                ("locid", locid.to_string()),
                ("startdt", start.format(window::QUERY_FORMAT).to_string()),
                ("enddt", end.format(window::QUERY_FORMAT).to_string()),
            ],
            Self::Legacy {
                locid,
                start,
                add_hours,
            } => legacy_params(locid, *start, *add_hours),
        }
    }
}

/// A `/timeline_viz` request. The endpoint only knows the legacy shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineQuery {
    pub locid: LocationId,
    pub start: NaiveDateTime,
    pub add_hours: u32,
}

impl TimelineQuery {
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        legacy_params(&self.locid, self.start, self.add_hours)
    }
}

fn legacy_params(
    locid: &LocationId,
    start: NaiveDateTime,
    add_hours: u32,
) -> Vec<(&'static str, String)> {
    vec![
        ("locid", locid.to_string()),
        ("date", start.format("%Y-%m-%d").to_string()),
        ("time", start.format("%H%M").to_string()),
        ("addhrs", add_hours.to_string()),
    ]
}
