//! Polled validator snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// SS58 account string identifying a validator. Opaque to the engine.
pub type StashAddress = String;

/// One raw field value from the backend's flattened key map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// One polled record for one validator at one wall-clock instant.
///
/// `dump_time` is when the poller fetched the record; `score_time` is when
/// the backend computed the scores it contains. The two can differ by
/// hours. Field keys use `.`-separated paths (e.g. `score.inclusion`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub stash: StashAddress,
    pub dump_time: DateTime<Utc>,
    pub score_time: DateTime<Utc>,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl Snapshot {
    /// Numeric field lookup; `None` for absent or non-numeric values.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(FieldValue::as_number)
    }

    /// Text field lookup; `None` for absent or non-text values.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(FieldValue::as_text)
    }
}
