//! Query-string form of the current view, used for deep links.
//!
//! Range deployments use `?locid=&startdt=&enddt=`, legacy deployments use
//! `?locid=&date=&addhrs=` where `date` is the full start datetime.

use serde::{Deserialize, Serialize};

use crate::directory::LocationId;
use crate::query::{GridQuery, QueryShape};
use crate::window;

#[derive(Debug, Default, Deserialize, Serialize)]
struct AddressParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    startdt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enddt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    addhrs: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlState {
    pub locid: Option<LocationId>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub add_hours: Option<String>,
}

impl UrlState {
    /// Read the view parameters for `shape` out of a raw query string.
    ///
    /// Returns `None` when none of them are present, so a bare page load keeps
    /// its defaults. Unknown parameters are ignored.
    #[must_use]
    pub fn from_query(raw: &str, shape: QueryShape) -> Option<Self> {
        let raw = raw.trim_start_matches('?');
        let params: AddressParams = match serde_urlencoded::from_str(raw) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed address query");
                return None;
            }
        };

        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let state = match shape {
            QueryShape::Range => Self {
                locid: non_empty(params.locid).map(LocationId::new),
                start: non_empty(params.startdt),
                end: non_empty(params.enddt),
                add_hours: None,
            },
            QueryShape::Legacy => Self {
                locid: non_empty(params.locid).map(LocationId::new),
                start: non_empty(params.date),
                end: None,
                add_hours: non_empty(params.addhrs),
            },
        };

        (state != Self::default()).then_some(state)
    }

    /// Encode for the address bar, without the leading `?`.
    #[must_use]
    pub fn to_query(&self, shape: QueryShape) -> String {
        let locid = self.locid.as_ref().map(ToString::to_string);
        let params = match shape {
            QueryShape::Range => AddressParams {
                locid,
                startdt: self.start.clone(),
                enddt: self.end.clone(),
                ..AddressParams::default()
            },
            QueryShape::Legacy => AddressParams {
                locid,
                date: self.start.clone(),
                addhrs: self.add_hours.clone(),
                ..AddressParams::default()
            },
        };

        serde_urlencoded::to_string(&params).unwrap_or_default()
    }
}

impl From<&GridQuery> for UrlState {
    /// The canonical address of a validated query.
    fn from(query: &GridQuery) -> Self {
        match query {
            GridQuery::Range { locid, start, end } => Self {
                locid: Some(locid.clone()),
                start: Some(window::format_local(*start)),
                end: Some(window::format_local(*end)),
                add_hours: None,
            },
            GridQuery::Legacy {
                locid,
                start,
                add_hours,
            } => Self {
                locid: Some(locid.clone()),
                start: Some(window::format_local(*start)),
                end: None,
                add_hours: Some(add_hours.to_string()),
            },
        }
    }
}
