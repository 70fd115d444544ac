use axum::{
    extract::{RawQuery, State},
    response::Html,
};
use chrono::TimeZone;
use serde::Deserialize;

use crate::common::{Api, AppState};
use crate::error::{AppError, AppResult};
use crate::hires::EventApi;
use crate::render;
use crate::url_state::UrlState;
use crate::viewer::Viewer;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageAction {
    /// "Get data" button
    Submit,
    /// End = start + 1h
    ExtendEnd,
    /// Start = end - 1h
    RewindStart,
}

/// Inputs posted back by the viewer form.
#[derive(Debug, Default, Deserialize)]
pub struct PageForm {
    pub action: Option<PageAction>,
    pub location: Option<String>,
    pub startdt: Option<String>,
    pub enddt: Option<String>,
    pub addhrs: Option<String>,
    /// Address of the rows the submitting page was showing
    pub prev: Option<String>,
}

impl PageForm {
    /// Copy the submitted input values into `viewer`.
    pub fn apply<A: EventApi, Tz: TimeZone>(self, viewer: &mut Viewer<A, Tz>) {
        if let Some(location) = self.location {
            viewer.set_location(location);
        }
        if let Some(start) = self.startdt {
            viewer.set_start(start);
        }
        if let Some(end) = self.enddt {
            viewer.set_end(end);
        }
        if let Some(hours) = self.addhrs {
            viewer.set_add_hours(hours);
        }
    }
}

/// The viewer page.
///
/// Without an `action`, any `locid`/`startdt`/`enddt` (or legacy
/// `locid`/`date`/`addhrs`) parameters are treated as a deep link and fetched
/// once. With an `action`, the form values are applied and the action runs.
/// If the action leaves nothing new to show (a shift, a rejected submission or
/// a failed fetch), the rows behind `prev` are shown again.
pub async fn viewer_page(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<Html<String>> {
    let raw = raw.unwrap_or_default();
    let mut form: PageForm = serde_urlencoded::from_str(&raw)
        .map_err(|e| AppError::BadRequest(format!("Invalid page parameters: {e}")))?;

    let mut viewer = state.viewer().await;

    match form.action.take() {
        Some(action) => {
            let prev = form.prev.take().filter(|p| !p.trim().is_empty());
            form.apply(&mut viewer);
            match action {
                PageAction::Submit => {
                    let _permit = state.upstream_permit().await?;
                    if let Err(e) = viewer.submit().await {
                        tracing::debug!(error = %e, "Form submission rejected");
                    }
                }
                PageAction::ExtendEnd => {
                    if let Err(e) = viewer.extend_end() {
                        tracing::debug!(error = %e, "Cannot extend end");
                    }
                }
                PageAction::RewindStart => {
                    if let Err(e) = viewer.rewind_start() {
                        tracing::debug!(error = %e, "Cannot rewind start");
                    }
                }
            }
            if let Some(prev) = prev.filter(|_| viewer.address().is_none()) {
                restore_previous(&state, &mut viewer, &prev).await?;
            }
        }
        None => {
            if let Some(link) = UrlState::from_query(&raw, viewer.shape()) {
                let _permit = state.upstream_permit().await?;
                if let Err(e) = viewer.open(link).await {
                    tracing::debug!(error = %e, "Deep link rejected");
                }
            }
        }
    }

    Ok(Html(render::page(&state.templates, &viewer, &state.rules)?))
}

/// Refetch the rows behind `prev`. Historical windows come from the cache.
async fn restore_previous(
    state: &AppState,
    viewer: &mut Viewer<Api>,
    prev: &str,
) -> AppResult<()> {
    let query = UrlState::from_query(prev, viewer.shape()).and_then(|s| viewer.query_for(&s));
    let Some(query) = query else {
        tracing::debug!(prev = %prev, "Previous address no longer resolves");
        return Ok(());
    };

    let _permit = state.upstream_permit().await?;
    match state.api.grid(&query).await {
        Ok(rows) => viewer.restore(&query, rows),
        Err(e) => tracing::warn!(error = %e, "Could not restore previous rows"),
    }
    Ok(())
}
