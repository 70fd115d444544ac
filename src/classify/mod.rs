//! Row classification for visual triage.
//!
//! Every table is checked independently and all hits are kept, so one row can
//! carry a danger tag, a start-of-interval tag and the time-marker tag at once.

mod rules;

pub use rules::{RuleSet, RulesError, composite_key};

use std::collections::BTreeSet;

use crate::hires::EventRecord;

/// Value of the time-grouping field that marks a separator row.
pub const TIME_MARKER: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Interval {
    Green,
    Amber,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowTag {
    Danger,
    Ops,
    Ops2,
    /// Border style for the start of an interval
    Start(Interval),
    TimeMarker,
}

impl RowTag {
    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Danger => "danger",
            Self::Ops => "ops",
            Self::Ops2 => "ops2",
            Self::Start(Interval::Green) => "start-green",
            Self::Start(Interval::Amber) => "start-amber",
            Self::Start(Interval::Red) => "start-red",
            Self::TimeMarker => "time-marker",
        }
    }
}

/// Styles applied to a single cell. Only the descriptor cell is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CellTag {
    DescriptorFill(Interval),
}

impl CellTag {
    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            Self::DescriptorFill(Interval::Green) => "start-green-fill",
            Self::DescriptorFill(Interval::Amber) => "start-amber-fill",
            Self::DescriptorFill(Interval::Red) => "start-red-fill",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub row: BTreeSet<RowTag>,
    pub cell: BTreeSet<CellTag>,
}

impl Classification {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row.is_empty() && self.cell.is_empty()
    }

    #[must_use]
    pub fn row_classes(&self) -> Vec<&'static str> {
        self.row.iter().map(|t| t.css_class()).collect()
    }

    #[must_use]
    pub fn descriptor_classes(&self) -> Vec<&'static str> {
        self.cell.iter().map(|t| t.css_class()).collect()
    }
}

impl RuleSet {
    #[must_use]
    pub fn classify(&self, record: &EventRecord) -> Classification {
        let mut out = Classification::default();
        let key = composite_key(record.event_code, record.parameter);

        if self.danger.contains(&key) {
            out.row.insert(RowTag::Danger);
        }
        if self.ops.contains(&key) {
            out.row.insert(RowTag::Ops);
        }
        if self.ops2.contains(&record.event_code) {
            out.row.insert(RowTag::Ops2);
        }

        for (table, interval) in [
            (&self.start_green, Interval::Green),
            (&self.start_amber, Interval::Amber),
            (&self.start_red, Interval::Red),
        ] {
            if table.contains(&record.event_code) {
                out.row.insert(RowTag::Start(interval));
                out.cell.insert(CellTag::DescriptorFill(interval));
            }
        }

        if record.tgroup.as_deref() == Some(TIME_MARKER) {
            out.row.insert(RowTag::TimeMarker);
        }

        out
    }
}
