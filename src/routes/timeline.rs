use axum::{
    Json,
    extract::{Query, State},
    response::Html,
};
use chrono::Local;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::common::AppState;
use crate::directory::LocationId;
use crate::error::{AppError, AppResult};
use crate::hires::{EventApi, TimelineOptions};
use crate::query::{ADD_HOURS_RANGE, TimelineQuery};
use crate::render;
use crate::window;

fn default_add_hours() -> u32 {
    1
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TimelineParams {
    /// Location id (`atms_id`)
    pub locid: String,
    /// Start, `YYYY-MM-DDTHH:MM`
    pub date: String,
    /// Hours after `date`, 1 to 32
    #[serde(default = "default_add_hours")]
    pub addhrs: u32,
}

/// Get the grouped interval timeline
///
/// Passes through the backend's range-bar chart options: one series per phase
/// and interval (green, yellow clearance, red clearance) grouped by ring.
#[utoipa::path(
    get,
    path = "/api/timeline",
    params(TimelineParams),
    responses(
        (status = 200, description = "Chart options", body = TimelineOptions),
        (status = 400, description = "Invalid start or hours"),
        (status = 502, description = "Event log backend failed"),
    ),
    tag = "timeline"
)]
pub async fn get_timeline(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> AppResult<Json<TimelineOptions>> {
    if !ADD_HOURS_RANGE.contains(&params.addhrs) {
        return Err(AppError::BadRequest(format!(
            "addhrs must be from 1 to 32, got {}",
            params.addhrs
        )));
    }

    let query = TimelineQuery {
        locid: LocationId::new(params.locid.trim()),
        start: window::parse_local(&params.date).map_err(|e| AppError::BadRequest(e.to_string()))?,
        add_hours: params.addhrs,
    };

    let _permit = state.upstream_permit().await?;
    Ok(Json(state.api.timeline(&query).await?))
}

/// Inputs of the timeline chart form. All optional so a bare visit shows the form.
#[derive(Debug, Default, Deserialize)]
pub struct TimelinePageParams {
    pub locid: Option<String>,
    pub date: Option<String>,
    pub addhrs: Option<u32>,
}

/// Timeline chart page
///
/// Renders the form and an empty chart; the browser fetches the series from
/// `/api/timeline` once a location and a valid start are chosen.
pub async fn timeline_page(
    State(state): State<AppState>,
    Query(params): Query<TimelinePageParams>,
) -> AppResult<Html<String>> {
    let directory = state.directory().await;

    let locid = params.locid.as_deref().map(str::trim).unwrap_or_default();
    let date = match params.date.as_deref().map(str::trim) {
        Some(date) if !date.is_empty() => date.to_string(),
        _ => window::default_window(&Local::now()).start,
    };
    let add_hours = params
        .addhrs
        .filter(|h| ADD_HOURS_RANGE.contains(h))
        .unwrap_or_else(default_add_hours);

    let query = if !locid.is_empty() && window::parse_local(&date).is_ok() {
        let add_hours = add_hours.to_string();
        let query = serde_urlencoded::to_string([
            ("locid", locid),
            ("date", date.as_str()),
            ("addhrs", add_hours.as_str()),
        ])
        .map_err(|e| AppError::Internal(format!("Timeline query: {e}")))?;
        Some(query)
    } else {
        None
    };

    tracing::debug!(locid = %locid, date = %date, add_hours, "Rendering timeline page");
    Ok(Html(render::timeline(
        &state.templates,
        &directory,
        locid,
        &date,
        add_hours,
        query.as_deref(),
    )?))
}
