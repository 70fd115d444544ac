use axum::{
    Json,
    extract::{Query, State},
    http::{
        HeaderValue,
        header::{self, HeaderMap},
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::classify::RuleSet;
use crate::common::AppState;
use crate::directory::LocationId;
use crate::error::{AppError, AppResult};
use crate::hires::{EventApi, EventRecord};
use crate::render::Column;

fn default_format() -> String {
    "json".to_string()
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GridParams {
    /// Location id (`atms_id`)
    pub locid: String,
    /// Window start, `YYYY-MM-DDTHH:MM` (range deployments)
    pub startdt: Option<String>,
    /// Window end, `YYYY-MM-DDTHH:MM` (range deployments)
    pub enddt: Option<String>,
    /// Window start, `YYYY-MM-DDTHH:MM` (legacy deployments)
    pub date: Option<String>,
    /// Hours after `date`, 1 to 32 (legacy deployments)
    pub addhrs: Option<String>,
    /// Response format: json (default), csv
    #[serde(default = "default_format")]
    pub format: String,
}

/// An event row with the style classes the viewer applies to it.
#[derive(Debug, Serialize, ToSchema)]
pub struct GridRow {
    #[serde(flatten)]
    pub record: EventRecord,
    /// Row-level classes (`danger`, `ops`, `ops2`, `start-*`, `time-marker`)
    pub row_classes: Vec<String>,
    /// Classes for the event descriptor cell (`start-*-fill`)
    pub descriptor_classes: Vec<String>,
}

impl GridRow {
    #[must_use]
    pub fn classify(record: EventRecord, rules: &RuleSet) -> Self {
        let classes = rules.classify(&record);
        Self {
            row_classes: classes.row_classes().into_iter().map(String::from).collect(),
            descriptor_classes: classes
                .descriptor_classes()
                .into_iter()
                .map(String::from)
                .collect(),
            record,
        }
    }
}

fn determine_format(query_format: &str, headers: &HeaderMap) -> String {
    // Query parameter takes precedence
    if query_format != "json" {
        return query_format.to_lowercase();
    }

    if let Some(accept) = headers.get(header::ACCEPT)
        && let Ok(accept_str) = accept.to_str()
        && accept_str.contains("text/csv")
    {
        return "csv".to_string();
    }

    "json".to_string()
}

fn build_csv_response(rows: &[GridRow]) -> AppResult<Response> {
    let records: Vec<EventRecord> = rows.iter().map(|r| r.record.clone()).collect();
    let columns = Column::for_rows(&records);

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header_row: Vec<&str> = columns.iter().map(|c| c.field()).collect();
    header_row.extend(["row_classes", "descriptor_classes"]);
    writer
        .write_record(&header_row)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    for row in rows {
        let mut fields: Vec<String> = columns
            .iter()
            .map(|c| c.value(&row.record).unwrap_or_default())
            .collect();
        fields.push(row.row_classes.join(" "));
        fields.push(row.descriptor_classes.join(" "));
        writer
            .write_record(&fields)
            .map_err(|e| AppError::Internal(e.to_string()))?;
    }

    let body = writer
        .into_inner()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=export.csv"),
            ),
        ],
        body,
    )
        .into_response())
}

/// Get classified event rows
///
/// Validates the window the same way the viewer page does, fetches the rows
/// from the event log backend and attaches the style classes for each row.
#[utoipa::path(
    get,
    path = "/api/grid",
    params(GridParams),
    responses(
        (status = 200, description = "Rows retrieved (empty array for no data)", body = Vec<GridRow>),
        (status = 400, description = "Unknown location or invalid window"),
        (status = 502, description = "Event log backend failed"),
    ),
    tag = "grid"
)]
pub async fn get_grid(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GridParams>,
) -> AppResult<Response> {
    let format = determine_format(&params.format, &headers);
    if format != "json" && format != "csv" {
        return Err(AppError::BadRequest(format!("Unsupported format '{format}'")));
    }

    let mut viewer = state.viewer().await;
    viewer.select_location(&LocationId::new(params.locid.trim()));
    if let Some(start) = params.startdt.or(params.date) {
        viewer.set_start(start);
    }
    if let Some(end) = params.enddt {
        viewer.set_end(end);
    }
    if let Some(hours) = params.addhrs {
        viewer.set_add_hours(hours);
    }

    let pending = viewer.prepare()?;
    let records = {
        let _permit = state.upstream_permit().await?;
        state.api.grid(&pending.query).await?
    };

    tracing::debug!(
        locid = %pending.query.locid(),
        rows = records.len(),
        format = %format,
        "Serving grid"
    );

    let rows: Vec<GridRow> = records
        .into_iter()
        .map(|r| GridRow::classify(r, &state.rules))
        .collect();

    if format == "csv" {
        return build_csv_response(&rows);
    }
    Ok(Json(rows).into_response())
}
