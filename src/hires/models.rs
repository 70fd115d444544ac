use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::directory::LocationId;
use crate::hires::ApiError;

/// One controller event row from `/hiresgrid`.
///
/// The first five fields are always present. The remaining columns depend on
/// the backend deployment: paired-event columns (`*2`, `duration`), status
/// strings, and the time-grouping marker/increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventRecord {
    pub loc_id: LocationId,
    pub dt: String,
    pub event_code: i64,
    pub parameter: i64,
    #[serde(default)]
    pub event_descriptor: String,

    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub dt2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_code2: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter2: Option<i64>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub event_descriptor2: Option<String>,
    /// Seconds between the paired events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub phase_status: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub overlap_status: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub ops_status: Option<String>,

    /// Time-grouping marker; `"x"` flags a marker row
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub tgroup: Option<String>,
    /// Time increment since the previous row
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub tinc: Option<String>,
}

/// Accept a string, a number, or null.
fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        },
    )
}

/// Decode a `/hiresgrid` body. An empty array, an empty object or `null`
/// all mean "no data".
///
/// # Errors
///
/// Returns `ApiError::Decode` if the body is neither a row array nor empty.
pub fn decode_grid(body: serde_json::Value) -> Result<Vec<EventRecord>, ApiError> {
    match body {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        rows @ serde_json::Value::Array(_) => serde_json::from_value(rows)
            .map_err(|e| ApiError::Decode(format!("grid rows: {e}"))),
        other => Err(ApiError::Decode(format!(
            "expected an array of events, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Range-bar chart options from `/timeline_viz`: one series per phase and
/// interval, each with its colour at the same index in `colors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimelineOptions {
    #[serde(default)]
    pub series: Vec<TimelineSeries>,
    #[serde(default)]
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimelineSeries {
    pub name: String,
    #[serde(default)]
    pub data: Vec<RangeBar>,
}

/// A bar in ring `x` spanning `y = [start_ms, end_ms]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RangeBar {
    pub x: String,
    #[schema(value_type = Vec<i64>)]
    pub y: [i64; 2],
}

impl TimelineOptions {
    /// Total number of bars across all series.
    #[must_use]
    pub fn bar_count(&self) -> usize {
        self.series.iter().map(|s| s.data.len()).sum()
    }
}
