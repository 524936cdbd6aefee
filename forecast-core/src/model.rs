use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, time::Duration};

/// Everything needed to issue one forecast call. Built once per run from [`crate::Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Requested hourly fields, in the order they should be asked for.
    pub hourly: Vec<String>,
    pub models: String,
    pub timezone: String,
    /// Extra query parameters appended verbatim. `timezone` lives here too.
    pub extras: BTreeMap<String, ExtraValue>,
    pub timeout: Duration,
}

/// A scalar query parameter value from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ExtraValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtraValue::Bool(b) => write!(f, "{b}"),
            ExtraValue::Integer(i) => write!(f, "{i}"),
            ExtraValue::Float(x) => write!(f, "{x}"),
            ExtraValue::Text(s) => f.write_str(s),
        }
    }
}

/// The raw forecast document, kept as the server sent it.
///
/// Only `hourly`, `hourly_units` and a handful of metadata keys are ever read;
/// everything else rides along untouched so a snapshot is a verbatim copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForecastResponse(Map<String, Value>);

impl ForecastResponse {
    pub fn new(document: Map<String, Value>) -> Self {
        Self(document)
    }

    /// Accepts any JSON value, but only objects are forecast documents.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn hourly(&self) -> Option<&Map<String, Value>> {
        self.0.get("hourly").and_then(Value::as_object)
    }

    pub fn hourly_units(&self) -> Option<&Map<String, Value>> {
        self.0.get("hourly_units").and_then(Value::as_object)
    }

    /// Offset of the requested timezone from UTC, defaulting to 0.
    pub fn utc_offset_seconds(&self) -> i64 {
        self.0
            .get("utc_offset_seconds")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(0)
    }

    pub fn latitude(&self) -> Option<f64> {
        self.0.get("latitude").and_then(Value::as_f64)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.0.get("longitude").and_then(Value::as_f64)
    }

    pub fn timezone(&self) -> Option<&str> {
        self.0.get("timezone").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}
