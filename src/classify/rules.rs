use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

/// Tables shipped with the crate; used when no override path is configured.
const BUILTIN_RULES: &str = include_str!("../../config/classification.json");

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("Failed to read rules file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid rules document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid composite key '{0}', expected <event_code>-<parameter>")]
    CompositeKey(String),
}

/// Fixed event-code tables driving row classification.
///
/// `danger` and `ops` are keyed by `"<event_code>-<parameter>"`; the other
/// tables match on the event code alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    pub(crate) danger: HashSet<String>,
    pub(crate) ops: HashSet<String>,
    pub(crate) ops2: HashSet<i64>,
    pub(crate) start_green: HashSet<i64>,
    pub(crate) start_amber: HashSet<i64>,
    pub(crate) start_red: HashSet<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesDocument {
    danger: Vec<String>,
    ops: Vec<String>,
    ops2: Vec<i64>,
    start_green: Vec<i64>,
    start_amber: Vec<i64>,
    start_red: Vec<i64>,
}

impl RuleSet {
    /// The tables in `config/classification.json`.
    ///
    /// # Errors
    ///
    /// Returns `RulesError` if the embedded document is malformed.
    pub fn builtin() -> Result<Self, RulesError> {
        Self::from_json(BUILTIN_RULES)
    }

    /// Load tables from `path`, or the built-in tables when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `RulesError` if the file cannot be read or is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, RulesError> {
        let Some(path) = path else {
            return Self::builtin();
        };

        let text = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let rules = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), "Loaded classification rules");
        Ok(rules)
    }

    /// # Errors
    ///
    /// Returns `RulesError` on malformed JSON or a non-canonical composite key.
    pub fn from_json(text: &str) -> Result<Self, RulesError> {
        let doc: RulesDocument = serde_json::from_str(text)?;

        Ok(Self {
            danger: composite_keys(doc.danger)?,
            ops: composite_keys(doc.ops)?,
            ops2: doc.ops2.into_iter().collect(),
            start_green: doc.start_green.into_iter().collect(),
            start_amber: doc.start_amber.into_iter().collect(),
            start_red: doc.start_red.into_iter().collect(),
        })
    }
}

/// `"<event_code>-<parameter>"` in plain decimal.
#[must_use]
pub fn composite_key(event_code: i64, parameter: i64) -> String {
    format!("{event_code}-{parameter}")
}

/// Keys must already be canonical, otherwise they could never match.
fn composite_keys(keys: Vec<String>) -> Result<HashSet<String>, RulesError> {
    keys.into_iter()
        .map(|key| {
            let canonical = key
                .split_once('-')
                .and_then(|(code, param)| {
                    Some((code.parse::<u32>().ok()?, param.parse::<u32>().ok()?))
                })
                .map(|(code, param)| composite_key(code.into(), param.into()));

            match canonical {
                Some(c) if c == key => Ok(key),
                _ => Err(RulesError::CompositeKey(key)),
            }
        })
        .collect()
}
