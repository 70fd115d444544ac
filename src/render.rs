//! Server-side rendering of the viewer and timeline pages.

use chrono::TimeZone;
use minijinja::Environment;
use serde::Serialize;

use crate::classify::RuleSet;
use crate::directory::{DirectoryShape, LocationDirectory, LocationOption};
use crate::hires::{EventApi, EventRecord};
use crate::query::{ADD_HOURS_RANGE, QueryShape};
use crate::viewer::{Notice, Viewer};

const PAGE_TEMPLATE: &str = "page.html";
const TIMELINE_TEMPLATE: &str = "timeline.html";

/// Grid columns, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    LocId,
    Dt,
    EventCode,
    Parameter,
    EventDescriptor,
    Dt2,
    EventCode2,
    Parameter2,
    EventDescriptor2,
    Duration,
    PhaseStatus,
    OverlapStatus,
    OpsStatus,
    TimeIncrement,
}

impl Column {
    /// Shown for every result set.
    pub const BASE: [Self; 10] = [
        Self::LocId,
        Self::Dt,
        Self::EventCode,
        Self::Parameter,
        Self::EventDescriptor,
        Self::Dt2,
        Self::EventCode2,
        Self::Parameter2,
        Self::EventDescriptor2,
        Self::Duration,
    ];

    /// Shown only when some row carries a value.
    pub const CONTEXT: [Self; 4] = [
        Self::PhaseStatus,
        Self::OverlapStatus,
        Self::OpsStatus,
        Self::TimeIncrement,
    ];

    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::LocId => "loc_id",
            Self::Dt => "dt",
            Self::EventCode => "event_code",
            Self::Parameter => "parameter",
            Self::EventDescriptor => "event_descriptor",
            Self::Dt2 => "dt2",
            Self::EventCode2 => "event_code2",
            Self::Parameter2 => "parameter2",
            Self::EventDescriptor2 => "event_descriptor2",
            Self::Duration => "duration",
            Self::PhaseStatus => "phase_status",
            Self::OverlapStatus => "overlap_status",
            Self::OpsStatus => "ops_status",
            Self::TimeIncrement => "tinc",
        }
    }

    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Self::LocId => "LocID",
            Self::Dt => "Datetime",
            Self::EventCode => "Event Code 1",
            Self::Parameter => "Parameter 1",
            Self::EventDescriptor | Self::EventDescriptor2 => "Event Descriptor",
            Self::Dt2 => "Datetime 2",
            Self::EventCode2 => "Event Code 2",
            Self::Parameter2 => "Parameter 2",
            Self::Duration => "Duration",
            Self::PhaseStatus => "Phase Status",
            Self::OverlapStatus => "Overlap Status",
            Self::OpsStatus => "Ops Status",
            Self::TimeIncrement => "Time Inc",
        }
    }

    #[must_use]
    pub fn value(self, record: &EventRecord) -> Option<String> {
        match self {
            Self::LocId => Some(record.loc_id.to_string()),
            Self::Dt => Some(record.dt.clone()),
            Self::EventCode => Some(record.event_code.to_string()),
            Self::Parameter => Some(record.parameter.to_string()),
            Self::EventDescriptor => Some(record.event_descriptor.clone()),
            Self::Dt2 => record.dt2.clone(),
            Self::EventCode2 => record.event_code2.map(|c| c.to_string()),
            Self::Parameter2 => record.parameter2.map(|p| p.to_string()),
            Self::EventDescriptor2 => record.event_descriptor2.clone(),
            Self::Duration => record.duration.map(|d| d.to_string()),
            Self::PhaseStatus => record.phase_status.clone(),
            Self::OverlapStatus => record.overlap_status.clone(),
            Self::OpsStatus => record.ops_status.clone(),
            Self::TimeIncrement => record.tinc.clone(),
        }
    }

    /// Base columns plus any context column with at least one value.
    #[must_use]
    pub fn for_rows(rows: &[EventRecord]) -> Vec<Self> {
        let mut columns = Self::BASE.to_vec();
        columns.extend(
            Self::CONTEXT
                .into_iter()
                .filter(|c| rows.iter().any(|r| c.value(r).is_some())),
        );
        columns
    }
}

#[derive(Serialize)]
struct PageView<'a> {
    query_shape: &'static str,
    directory_shape: &'static str,
    options: Vec<LocationOption>,
    location: &'a str,
    start: &'a str,
    end: &'a str,
    add_hours: &'a str,
    add_hours_choices: Vec<u32>,
    invalid: Vec<&'static str>,
    notice: Option<&'static str>,
    busy: bool,
    headers: Vec<&'static str>,
    rows: Vec<RowView>,
    address: Option<&'a str>,
}

#[derive(Serialize)]
struct TimelineView<'a> {
    options: Vec<LocationOption>,
    locid: &'a str,
    date: &'a str,
    add_hours: u32,
    add_hours_choices: Vec<u32>,
    query: Option<&'a str>,
}

#[derive(Serialize)]
struct RowView {
    classes: String,
    cells: Vec<CellView>,
}

#[derive(Serialize)]
struct CellView {
    text: String,
    classes: String,
}

/// Template environment with both page templates registered.
///
/// # Errors
///
/// Returns `minijinja::Error` if a template does not compile.
pub fn templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template(PAGE_TEMPLATE, include_str!("../templates/page.html"))?;
    env.add_template(TIMELINE_TEMPLATE, include_str!("../templates/timeline.html"))?;
    Ok(env)
}

/// Render the viewer's current state, classifying rows against `rules`.
///
/// # Errors
///
/// Returns `minijinja::Error` if rendering fails.
pub fn page<A: EventApi, Tz: TimeZone>(
    env: &Environment<'_>,
    viewer: &Viewer<A, Tz>,
    rules: &RuleSet,
) -> Result<String, minijinja::Error> {
    let columns = Column::for_rows(viewer.rows());

    let rows = viewer
        .classified(rules)
        .map(|(record, classes)| RowView {
            classes: classes.row_classes().join(" "),
            cells: columns
                .iter()
                .map(|column| CellView {
                    text: column.value(record).unwrap_or_default(),
                    classes: if *column == Column::EventDescriptor {
                        classes.descriptor_classes().join(" ")
                    } else {
                        String::new()
                    },
                })
                .collect(),
        })
        .collect();

    let view = PageView {
        query_shape: match viewer.shape() {
            QueryShape::Range => "range",
            QueryShape::Legacy => "legacy",
        },
        directory_shape: match viewer.directory().shape() {
            DirectoryShape::Flat => "flat",
            DirectoryShape::Paired => "paired",
        },
        options: viewer.directory().options(),
        location: viewer.location(),
        start: viewer.start(),
        end: viewer.end(),
        add_hours: viewer.add_hours(),
        add_hours_choices: ADD_HOURS_RANGE.collect(),
        invalid: viewer.invalid_fields().map(|f| f.name()).collect(),
        notice: viewer.notice().map(|n| match n {
            Notice::NoData => "no_data",
            Notice::Error => "error",
        }),
        busy: viewer.is_busy(),
        headers: columns.iter().map(|c| c.header()).collect(),
        rows,
        address: viewer.address(),
    };

    env.get_template(PAGE_TEMPLATE)?.render(view)
}

/// Render the timeline chart page. `query` is the `/api/timeline` query the
/// browser should chart, if any.
///
/// Location options always carry ids, whatever the directory shape, since the
/// timeline endpoint takes ids.
///
/// # Errors
///
/// Returns `minijinja::Error` if rendering fails.
pub fn timeline(
    env: &Environment<'_>,
    directory: &LocationDirectory,
    locid: &str,
    date: &str,
    add_hours: u32,
    query: Option<&str>,
) -> Result<String, minijinja::Error> {
    let options = directory
        .options()
        .into_iter()
        .filter_map(|opt| {
            let id = directory.resolve(&opt.value)?;
            Some(LocationOption {
                value: id.to_string(),
                label: opt.label,
            })
        })
        .collect();

    let view = TimelineView {
        options,
        locid,
        date,
        add_hours,
        add_hours_choices: ADD_HOURS_RANGE.collect(),
        query,
    };

    env.get_template(TIMELINE_TEMPLATE)?.render(view)
}
