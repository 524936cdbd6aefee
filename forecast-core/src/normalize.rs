use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::{error::ForecastError, model::ForecastResponse};

const TIME_FIELD: &str = "time";

/// One hourly series with its unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub field: String,
    pub unit: String,
    pub values: Vec<Value>,
}

impl Column {
    /// `"<field> [<unit>]"`
    pub fn label(&self) -> String {
        format!("{} [{}]", self.field, self.unit)
    }
}

/// A single forecast hour. A cell is `None` when its series is shorter than
/// the time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow<'a> {
    pub datetime: NaiveDateTime,
    pub cells: Vec<Option<&'a Value>>,
}

/// The forecast laid out for display: a local time axis plus one column per
/// hourly field, in response order.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    pub times: Vec<NaiveDateTime>,
    pub columns: Vec<Column>,
}

impl ForecastTable {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.columns.iter().map(Column::label).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = DisplayRow<'_>> {
        self.times.iter().enumerate().map(|(i, &datetime)| DisplayRow {
            datetime,
            cells: self.columns.iter().map(|c| c.values.get(i)).collect(),
        })
    }
}

/// Shifts a Unix timestamp by the UTC offset and drops the zone, giving the
/// local wall-clock time (no DST handling beyond the fixed offset).
pub fn localize(timestamp: i64, utc_offset_seconds: i64) -> Option<NaiveDateTime> {
    let local = timestamp.checked_add(utc_offset_seconds)?;
    DateTime::from_timestamp(local, 0).map(|dt| dt.naive_utc())
}

pub fn normalize(response: &ForecastResponse) -> Result<ForecastTable, ForecastError> {
    let hourly = response
        .hourly()
        .ok_or_else(|| ForecastError::MissingData("response has no 'hourly' section".into()))?;

    let raw_times = hourly
        .get(TIME_FIELD)
        .and_then(Value::as_array)
        .ok_or_else(|| ForecastError::MissingData("'hourly.time' is missing".into()))?;

    let offset = response.utc_offset_seconds();
    let times = raw_times
        .iter()
        .map(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .and_then(|ts| localize(ts, offset))
                .ok_or_else(|| ForecastError::MissingData(format!("invalid timestamp {v}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let fields: Vec<_> = hourly.iter().filter(|(name, _)| *name != TIME_FIELD).collect();

    let no_units = serde_json::Map::new();
    let units = match response.hourly_units() {
        Some(units) => units,
        None if fields.is_empty() => &no_units,
        None => {
            return Err(ForecastError::MissingData("response has no 'hourly_units' section".into()));
        }
    };

    let columns = fields
        .into_iter()
        .map(|(field, series)| {
            let unit = match units.get(field) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    return Err(ForecastError::MissingData(format!("no unit for '{field}'")));
                }
            };
            let values = series.as_array().cloned().ok_or_else(|| {
                ForecastError::MissingData(format!("'hourly.{field}' is not a series"))
            })?;
            Ok(Column { field: field.clone(), unit, values })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ForecastTable { times, columns })
}
