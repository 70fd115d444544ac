//! Page controller for the event grid.
//!
//! A [`Viewer`] holds everything one page session shows: the location and
//! window inputs, which of them are flagged invalid, the notification banner,
//! the busy state of the fetch trigger, the displayed rows and the address
//! query. It is independent of how the page is rendered.
//!
//! Overlapping fetches are resolved by supersede. Every fetch takes the next
//! sequence number in [`Viewer::prepare`]; [`Viewer::complete`] drops any
//! response whose number is no longer the latest.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Local, TimeZone, Utc};

use crate::classify::{Classification, RuleSet};
use crate::directory::{LocationDirectory, LocationId};
use crate::hires::{ApiError, EventApi, EventRecord};
use crate::query::{ADD_HOURS_RANGE, GridQuery, QueryShape};
use crate::url_state::UrlState;
use crate::window::{self, TimeError, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Location,
    Start,
    End,
    AddHours,
}

impl Field {
    /// Form parameter name of the input.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Start => "startdt",
            Self::End => "enddt",
            Self::AddHours => "addhrs",
        }
    }
}

/// Banner shown above the grid. At most one is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    NoData,
    Error,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Location '{0}' is not in the directory")]
    UnknownLocation(String),

    #[error("Invalid {}: {source}", .field.name())]
    DateTime { field: Field, source: TimeError },

    #[error("End {end} is before start {start}")]
    EndBeforeStart { start: String, end: String },

    #[error("Hours must be a whole number from 1 to 32, got '{0}'")]
    AddHours(String),
}

impl ValidationError {
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            Self::UnknownLocation(_) => Field::Location,
            Self::DateTime { field, .. } => *field,
            Self::EndBeforeStart { .. } => Field::End,
            Self::AddHours(_) => Field::AddHours,
        }
    }
}

/// A validated fetch that has been started but not completed.
#[derive(Debug, Clone)]
pub struct PendingFetch {
    pub seq: u64,
    pub query: GridQuery,
    address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Rows replaced with this many records
    Displayed(usize),
    NoData,
    /// Previous rows kept
    Failed,
    /// A newer fetch started before this one finished
    Superseded,
}

pub struct Viewer<A, Tz: TimeZone = Local> {
    api: A,
    tz: Tz,
    shape: QueryShape,
    directory: Arc<LocationDirectory>,

    location: String,
    start: String,
    end: String,
    add_hours: String,
    invalid: BTreeSet<Field>,

    notice: Option<Notice>,
    busy: bool,
    rows: Vec<EventRecord>,
    address: Option<String>,

    seq: u64,
}

impl<A: EventApi, Tz: TimeZone> Viewer<A, Tz> {
    /// A fresh page: no location chosen and today's default window.
    pub fn new(api: A, tz: Tz, shape: QueryShape, directory: Arc<LocationDirectory>) -> Self {
        let TimeWindow { start, end } = window::default_window(&Utc::now().with_timezone(&tz));

        Self {
            api,
            tz,
            shape,
            directory,
            location: String::new(),
            start,
            end,
            add_hours: "1".to_string(),
            invalid: BTreeSet::new(),
            notice: None,
            busy: false,
            rows: Vec::new(),
            address: None,
            seq: 0,
        }
    }

    /// Replace the window inputs.
    #[must_use]
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.start = window.start;
        self.end = window.end;
        self
    }

    /// Seed the displayed rows.
    #[must_use]
    pub fn with_rows(mut self, rows: Vec<EventRecord>) -> Self {
        self.rows = rows;
        self
    }

    pub fn shape(&self) -> QueryShape {
        self.shape
    }

    pub fn directory(&self) -> &LocationDirectory {
        &self.directory
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn add_hours(&self) -> &str {
        &self.add_hours
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start.clone(),
            end: self.end.clone(),
        }
    }

    pub fn is_invalid(&self, field: Field) -> bool {
        self.invalid.contains(&field)
    }

    pub fn invalid_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.invalid.iter().copied()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn rows(&self) -> &[EventRecord] {
        &self.rows
    }

    /// Address query for the last successful fetch, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn set_location(&mut self, value: impl Into<String>) {
        self.location = value.into();
        self.invalid.remove(&Field::Location);
    }

    /// Pick a location by id. Returns `false` (and clears the input) if the
    /// directory does not list it.
    pub fn select_location(&mut self, id: &LocationId) -> bool {
        match self.directory.input_value(id) {
            Some(value) => {
                self.set_location(value);
                true
            }
            None => {
                tracing::warn!(locid = %id, "Location id not in directory");
                self.set_location(String::new());
                false
            }
        }
    }

    pub fn set_start(&mut self, value: impl Into<String>) {
        self.start = value.into();
        self.invalid.remove(&Field::Start);
    }

    pub fn set_end(&mut self, value: impl Into<String>) {
        self.end = value.into();
        self.invalid.remove(&Field::End);
    }

    pub fn set_add_hours(&mut self, value: impl Into<String>) {
        self.add_hours = value.into();
        self.invalid.remove(&Field::AddHours);
    }

    /// End = start + 1h. Only the end input changes.
    ///
    /// # Errors
    ///
    /// Returns `TimeError` and flags the start input if it cannot be parsed.
    pub fn extend_end(&mut self) -> Result<(), TimeError> {
        match window::shift(&self.tz, &self.start, 1.0) {
            Ok(end) => {
                self.set_end(end);
                Ok(())
            }
            Err(e) => {
                self.invalid.insert(Field::Start);
                Err(e)
            }
        }
    }

    /// Start = end - 1h. Only the start input changes.
    ///
    /// # Errors
    ///
    /// Returns `TimeError` and flags the end input if it cannot be parsed.
    pub fn rewind_start(&mut self) -> Result<(), TimeError> {
        match window::shift(&self.tz, &self.end, -1.0) {
            Ok(start) => {
                self.set_start(start);
                Ok(())
            }
            Err(e) => {
                self.invalid.insert(Field::End);
                Err(e)
            }
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Validate the inputs and start a fetch.
    ///
    /// Every offending input is flagged; the first problem is returned. Nothing
    /// else changes on failure.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn prepare(&mut self) -> Result<PendingFetch, ValidationError> {
        self.invalid.clear();

        let query = match self.validate() {
            Ok(query) => query,
            Err(errors) => {
                for e in &errors {
                    self.invalid.insert(e.field());
                }
                let first = errors.into_iter().next().unwrap_or_else(|| {
                    ValidationError::UnknownLocation(self.location.clone())
                });
                tracing::debug!(error = %first, "Query blocked by validation");
                return Err(first);
            }
        };

        self.seq += 1;
        self.busy = true;

        let address = UrlState::from(&query).to_query(self.shape);

        Ok(PendingFetch {
            seq: self.seq,
            query,
            address,
        })
    }

    fn validate(&self) -> Result<GridQuery, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let locid = self.directory.resolve(&self.location);
        if locid.is_none() {
            errors.push(ValidationError::UnknownLocation(self.location.clone()));
        }

        let start = window::parse_local(&self.start).map_err(|source| ValidationError::DateTime {
            field: Field::Start,
            source,
        });

        match self.shape {
            QueryShape::Range => {
                let end = window::parse_local(&self.end).map_err(|source| {
                    ValidationError::DateTime {
                        field: Field::End,
                        source,
                    }
                });
                match (start, end) {
                    (Ok(start), Ok(end)) => {
                        let bounds = TimeWindow {
                            start: window::format_local(start),
                            end: window::format_local(end),
                        };
                        if !bounds.is_ordered() {
                            errors.push(ValidationError::EndBeforeStart {
                                start: bounds.start,
                                end: bounds.end,
                            });
                        }
                    }
                    (start, end) => {
                        errors.extend(start.err());
                        errors.extend(end.err());
                    }
                }
                match (locid, errors.is_empty()) {
                    (Some(locid), true) => GridQuery::range(locid, &self.start, &self.end)
                        .map_err(|source| {
                            vec![ValidationError::DateTime {
                                field: Field::Start,
                                source,
                            }]
                        }),
                    _ => Err(errors),
                }
            }
            QueryShape::Legacy => {
                errors.extend(start.err());
                let hours = self
                    .add_hours
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|h| ADD_HOURS_RANGE.contains(h));
                if hours.is_none() {
                    errors.push(ValidationError::AddHours(self.add_hours.clone()));
                }
                match (locid, hours, errors.is_empty()) {
                    (Some(locid), Some(hours), true) => GridQuery::legacy(locid, &self.start, hours)
                        .map_err(|source| {
                            vec![ValidationError::DateTime {
                                field: Field::Start,
                                source,
                            }]
                        }),
                    _ => Err(errors),
                }
            }
        }
    }

    /// Apply the result of `pending`. Stale results are ignored.
    pub fn complete(
        &mut self,
        pending: PendingFetch,
        result: Result<Vec<EventRecord>, ApiError>,
    ) -> FetchOutcome {
        if pending.seq != self.seq {
            tracing::debug!(
                seq = pending.seq,
                latest = self.seq,
                "Dropping superseded grid response"
            );
            return FetchOutcome::Superseded;
        }

        self.busy = false;

        match result {
            Ok(rows) if rows.is_empty() => {
                tracing::info!(locid = %pending.query.locid(), "No data for window");
                self.notice = Some(Notice::NoData);
                self.rows.clear();
                self.address = Some(pending.address);
                FetchOutcome::NoData
            }
            Ok(rows) => {
                let count = rows.len();
                tracing::info!(locid = %pending.query.locid(), rows = count, "Grid updated");
                self.notice = None;
                self.rows = rows;
                self.address = Some(pending.address);
                FetchOutcome::Displayed(count)
            }
            Err(e) => {
                tracing::error!(error = %e, locid = %pending.query.locid(), "Grid fetch failed");
                self.notice = Some(Notice::Error);
                FetchOutcome::Failed
            }
        }
    }

    /// The query behind an address this viewer produced earlier, if it still
    /// names a listed location and a valid window.
    #[must_use]
    pub fn query_for(&self, state: &UrlState) -> Option<GridQuery> {
        let locid = state
            .locid
            .clone()
            .filter(|id| self.directory.input_value(id).is_some())?;
        let start = state.start.as_deref()?;

        match self.shape {
            QueryShape::Range => GridQuery::range(locid, start, state.end.as_deref()?)
                .ok()
                .filter(|q| matches!(q, GridQuery::Range { start, end, .. } if start <= end)),
            QueryShape::Legacy => {
                let hours = state
                    .add_hours
                    .as_deref()?
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|h| ADD_HOURS_RANGE.contains(h))?;
                GridQuery::legacy(locid, start, hours).ok()
            }
        }
    }

    /// Show `rows` fetched earlier for `query` again. Inputs, flags and the
    /// notice are left alone.
    pub fn restore(&mut self, query: &GridQuery, rows: Vec<EventRecord>) {
        tracing::debug!(locid = %query.locid(), rows = rows.len(), "Restoring previous rows");
        self.rows = rows;
        self.address = Some(UrlState::from(query).to_query(self.shape));
    }

    /// Validate, fetch and apply in one step.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` without contacting the backend if the inputs
    /// are invalid.
    pub async fn submit(&mut self) -> Result<FetchOutcome, ValidationError> {
        let pending = self.prepare()?;
        let result = self.api.grid(&pending.query).await;
        Ok(self.complete(pending, result))
    }

    /// Seed the inputs from a deep link and fetch once.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the seeded inputs do not form a valid query.
    pub async fn open(&mut self, state: UrlState) -> Result<FetchOutcome, ValidationError> {
        if let Some(locid) = &state.locid {
            self.select_location(locid);
        }
        if let Some(start) = state.start {
            self.set_start(start);
        }
        if let Some(end) = state.end {
            self.set_end(end);
        }
        if let Some(hours) = state.add_hours {
            self.set_add_hours(hours);
        }

        tracing::debug!(location = %self.location, start = %self.start, "Opening deep link");
        self.submit().await
    }

    /// Displayed rows with their styles, in display order.
    pub fn classified<'a>(
        &'a self,
        rules: &'a RuleSet,
    ) -> impl Iterator<Item = (&'a EventRecord, Classification)> + 'a {
        self.rows.iter().map(move |r| (r, rules.classify(r)))
    }
}
