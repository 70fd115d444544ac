//! Location directory: `atms_id` to display name.
//!
//! The backend serves one of two shapes, chosen per deployment:
//!
//! - **flat**: `{"<key>": {"name": "...", "atms_id": 5}, ...}`. Feeds a
//!   select control, so the input value is always an `atms_id`.
//! - **paired**: `[{"<display>": <atms_id>}, {"<atms_id>": "<display>"}]`.
//!   Feeds a free-text input with suggestions; typed values must exist in the
//!   forward map.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::hires::{ApiError, EventApi};

/// Opaque backend location key. The backend sends it as a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for LocationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => Self(id.to_string()),
            RawId::Str(id) => Self(id.trim().to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryShape {
    Flat,
    Paired,
}

impl FromStr for DirectoryShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" | "select" => Ok(Self::Flat),
            "paired" | "datalist" => Ok(Self::Paired),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlatEntry {
    pub name: String,
    pub atms_id: LocationId,
}

/// A picker entry: what the control shows and what it submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LocationOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub enum LocationDirectory {
    Flat(Vec<FlatEntry>),
    Paired {
        forward: BTreeMap<String, LocationId>,
        reverse: BTreeMap<LocationId, String>,
    },
}

impl LocationDirectory {
    #[must_use]
    pub fn empty(shape: DirectoryShape) -> Self {
        match shape {
            DirectoryShape::Flat => Self::Flat(Vec::new()),
            DirectoryShape::Paired => Self::Paired {
                forward: BTreeMap::new(),
                reverse: BTreeMap::new(),
            },
        }
    }

    /// Fetch and decode the directory.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `ApiError::Decode` for a payload of the wrong shape.
    pub async fn fetch<A: EventApi>(api: &A, shape: DirectoryShape) -> Result<Self, ApiError> {
        let directory = Self::from_json(shape, api.locations().await?)?;
        tracing::info!(
            shape = ?shape,
            locations = directory.len(),
            "Location directory loaded"
        );
        Ok(directory)
    }

    /// Interpret a `/form_locids` payload in the configured shape.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` when the payload does not match `shape`.
    pub fn from_json(shape: DirectoryShape, payload: serde_json::Value) -> Result<Self, ApiError> {
        match shape {
            DirectoryShape::Flat => {
                let entries: BTreeMap<String, FlatEntry> = serde_json::from_value(payload)
                    .map_err(|e| ApiError::Decode(format!("flat location directory: {e}")))?;
                Ok(Self::Flat(entries.into_values().collect()))
            }
            DirectoryShape::Paired => {
                let (forward, reverse): (BTreeMap<String, LocationId>, BTreeMap<String, String>) =
                    serde_json::from_value(payload)
                        .map_err(|e| ApiError::Decode(format!("paired location directory: {e}")))?;
                let reverse: BTreeMap<LocationId, String> = reverse
                    .into_iter()
                    .map(|(id, name)| (LocationId::new(id.trim()), name))
                    .collect();

                for (name, id) in &forward {
                    if reverse.get(id) != Some(name) {
                        tracing::warn!(
                            name = %name,
                            id = %id,
                            "Location does not round-trip through the reverse map"
                        );
                    }
                }

                Ok(Self::Paired { forward, reverse })
            }
        }
    }

    #[must_use]
    pub fn shape(&self) -> DirectoryShape {
        match self {
            Self::Flat(_) => DirectoryShape::Flat,
            Self::Paired { .. } => DirectoryShape::Paired,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(entries) => entries.len(),
            Self::Paired { forward, .. } => forward.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Picker entries in display order.
    #[must_use]
    pub fn options(&self) -> Vec<LocationOption> {
        match self {
            Self::Flat(entries) => entries
                .iter()
                .map(|e| LocationOption {
                    value: e.atms_id.to_string(),
                    label: e.name.clone(),
                })
                .collect(),
            Self::Paired { forward, .. } => forward
                .iter()
                .map(|(name, id)| LocationOption {
                    value: name.clone(),
                    label: format!("{name} ({id})"),
                })
                .collect(),
        }
    }

    /// Map the location input's value to an id, or `None` if it is not listed.
    #[must_use]
    pub fn resolve(&self, input: &str) -> Option<LocationId> {
        let input = input.trim();
        match self {
            Self::Flat(entries) => entries
                .iter()
                .find(|e| e.atms_id.as_str() == input)
                .map(|e| e.atms_id.clone()),
            Self::Paired { forward, .. } => forward.get(input).cloned(),
        }
    }

    /// The value the location input shows for `id`.
    #[must_use]
    pub fn input_value(&self, id: &LocationId) -> Option<String> {
        match self {
            Self::Flat(entries) => entries
                .iter()
                .any(|e| &e.atms_id == id)
                .then(|| id.to_string()),
            Self::Paired { reverse, .. } => reverse.get(id).cloned(),
        }
    }
}
