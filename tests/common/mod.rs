//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde_json::json;
use tokio::net::TcpListener;

use hires_viewer::directory::LocationId;
use hires_viewer::hires::{ApiError, EventApi, EventRecord, TimelineOptions};
use hires_viewer::query::{GridQuery, TimelineQuery};

pub fn record(event_code: i64, parameter: i64) -> EventRecord {
    EventRecord {
        loc_id: LocationId::new("5"),
        dt: "2024-11-25 00:00:01.100".to_string(),
        event_code,
        parameter,
        event_descriptor: format!("Event {event_code}"),
        dt2: None,
        event_code2: None,
        parameter2: None,
        event_descriptor2: None,
        duration: None,
        phase_status: None,
        overlap_status: None,
        ops_status: None,
        tgroup: None,
        tinc: None,
    }
}

pub fn paired_directory_json() -> serde_json::Value {
    json!([
        {"Main & 1st": 5, "Oak & 2nd": "6", "Quiet St": 7, "Broken Ave": 9},
        {"5": "Main & 1st", "6": "Oak & 2nd", "7": "Quiet St", "9": "Broken Ave"}
    ])
}

pub fn flat_directory_json() -> serde_json::Value {
    json!({
        "a": {"name": "Main & 1st", "atms_id": 5},
        "b": {"name": "Oak & 2nd", "atms_id": "6"}
    })
}

/// Which backend endpoint a [`MockApi`] call hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Locations,
    Grid(GridQuery),
    Timeline(TimelineQuery),
}

/// Scripted [`EventApi`]. Grid responses are served in order; once the
/// script runs out every grid call returns no rows.
pub struct MockApi {
    locations: Result<serde_json::Value, ApiError>,
    grid: Mutex<VecDeque<Result<Vec<EventRecord>, ApiError>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockApi {
    pub fn new(locations: serde_json::Value) -> Self {
        Self {
            locations: Ok(locations),
            grid: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_locations(error: ApiError) -> Self {
        Self {
            locations: Err(error),
            grid: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_grid(&self, response: Result<Vec<EventRecord>, ApiError>) {
        self.grid.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn grid_calls(&self) -> Vec<GridQuery> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Grid(q) => Some(q),
                _ => None,
            })
            .collect()
    }
}

impl EventApi for MockApi {
    async fn locations(&self) -> Result<serde_json::Value, ApiError> {
        self.calls.lock().unwrap().push(Call::Locations);
        self.locations.clone()
    }

    async fn grid(&self, query: &GridQuery) -> Result<Vec<EventRecord>, ApiError> {
        self.calls.lock().unwrap().push(Call::Grid(query.clone()));
        self.grid.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn timeline(&self, query: &TimelineQuery) -> Result<TimelineOptions, ApiError> {
        self.calls.lock().unwrap().push(Call::Timeline(query.clone()));
        Ok(TimelineOptions {
            series: Vec::new(),
            colors: Vec::new(),
        })
    }
}

fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn est() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).unwrap()
}

fn edt() -> FixedOffset {
    FixedOffset::west_opt(4 * 3600).unwrap()
}

/// US Eastern time with the 2024 DST transitions only: clocks jump from
/// 02:00 to 03:00 on 2024-03-10 and fall back from 02:00 to 01:00 on
/// 2024-11-03.
#[derive(Debug, Clone, Copy)]
pub struct Eastern2024;

impl TimeZone for Eastern2024 {
    type Offset = FixedOffset;

    fn from_offset(_offset: &FixedOffset) -> Self {
        Eastern2024
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
        self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
        let gap = naive(2024, 3, 10, 2, 0)..naive(2024, 3, 10, 3, 0);
        let fold = naive(2024, 11, 3, 1, 0)..naive(2024, 11, 3, 2, 0);
        let summer = naive(2024, 3, 10, 3, 0)..naive(2024, 11, 3, 1, 0);

        if gap.contains(local) {
            LocalResult::None
        } else if fold.contains(local) {
            LocalResult::Ambiguous(edt(), est())
        } else if summer.contains(local) {
            LocalResult::Single(edt())
        } else {
            LocalResult::Single(est())
        }
    }

    fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
        self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
    }

    fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
        if (naive(2024, 3, 10, 7, 0)..naive(2024, 11, 3, 6, 0)).contains(utc) {
            edt()
        } else {
            est()
        }
    }
}

/// What the fake backend saw.
#[derive(Clone, Default)]
pub struct Upstream {
    pub grid_calls: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub timeline_calls: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub cookies: Arc<Mutex<Vec<Option<String>>>>,
    /// `/form_locids` answers 503 while this is above zero
    pub location_failures: Arc<AtomicUsize>,
    /// Serve the flat directory shape instead of the paired one
    pub flat_directory: Arc<AtomicBool>,
}

impl Upstream {
    pub fn fail_locations(&self, times: usize) {
        self.location_failures.store(times, Ordering::SeqCst);
    }

    pub fn serve_flat_directory(&self) {
        self.flat_directory.store(true, Ordering::SeqCst);
    }

    /// Number of `/form_locids` requests, failed ones included.
    pub fn location_hits(&self) -> usize {
        self.cookies.lock().unwrap().len()
    }

    pub fn grid_calls(&self) -> Vec<HashMap<String, String>> {
        self.grid_calls.lock().unwrap().clone()
    }

    pub fn timeline_calls(&self) -> Vec<HashMap<String, String>> {
        self.timeline_calls.lock().unwrap().clone()
    }
}

async fn upstream_locations(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
) -> Response {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    upstream.cookies.lock().unwrap().push(cookie);

    let failing = upstream
        .location_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return (StatusCode::SERVICE_UNAVAILABLE, "warming up").into_response();
    }

    if upstream.flat_directory.load(Ordering::SeqCst) {
        Json(flat_directory_json()).into_response()
    } else {
        Json(paired_directory_json()).into_response()
    }
}

/// Location 5 has rows, 6 answers `[]`, 7 answers `{}`, 8 answers garbage,
/// 9 fails with HTTP 500.
async fn upstream_grid(
    State(upstream): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let locid = params.get("locid").cloned().unwrap_or_default();
    upstream.grid_calls.lock().unwrap().push(params);

    match locid.as_str() {
        "5" => Json(json!([
            {
                "loc_id": 5,
                "dt": "2024-11-25 00:00:01.100",
                "event_code": 1,
                "parameter": 2,
                "event_descriptor": "Phase Begin Green",
                "dt2": "2024-11-25 00:00:31.100",
                "event_code2": 7,
                "parameter2": 2,
                "event_descriptor2": "Phase Green Termination",
                "duration": 30.0
            },
            {
                "loc_id": "5",
                "dt": "2024-11-25 00:10:00.000",
                "event_code": 173,
                "parameter": 6,
                "event_descriptor": "Flash Status Change",
                "tgroup": "x",
                "tinc": 15
            }
        ]))
        .into_response(),
        "6" => Json(json!([])).into_response(),
        "7" => Json(json!({})).into_response(),
        "8" => Json(json!("not rows")).into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    }
}

async fn upstream_timeline(
    State(upstream): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    upstream.timeline_calls.lock().unwrap().push(params);
    Json(json!({
        "series": [
            {
                "name": "Ph 2 Green",
                "data": [{"x": "R1", "y": [1726822800000_i64, 1726822830000_i64]}]
            },
            {"name": "Ph 2 Yellow Clr", "data": []}
        ],
        "colors": ["#00E396", "#FEB019"]
    }))
}

/// Start a fake event log backend on an ephemeral port.
pub async fn spawn_upstream() -> (String, Upstream) {
    let upstream = Upstream::default();
    let router = Router::new()
        .route("/form_locids", get(upstream_locations))
        .route("/hiresgrid", get(upstream_grid))
        .route("/timeline_viz", get(upstream_timeline))
        .with_state(upstream.clone());

    (serve(router).await, upstream)
}

/// Serve `router` on an ephemeral port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
