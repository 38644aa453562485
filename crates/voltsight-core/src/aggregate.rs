//! Monthly aggregation of predicted intervals

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::warn;

use crate::error::AggregationError;
use crate::prediction::RawIntervalResponse;

/// Predicted kWh keyed by English month name
///
/// Months keep the position of their first appearance. Inserting an existing
/// month replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyPrediction {
    entries: Vec<(String, f64)>,
}

impl MonthlyPrediction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a month's value, returning the value it replaced
    pub fn insert(&mut self, month: impl Into<String>, value: f64) -> Option<f64> {
        let month = month.into();
        match self.entries.iter_mut().find(|(m, _)| *m == month) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((month, value));
                None
            }
        }
    }

    pub fn get(&self, month: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(m, _)| m == month)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(m, v)| (m.as_str(), *v))
    }

    /// Sum of all monthly values
    pub fn annual_total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }
}

impl Serialize for MonthlyPrediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (month, value) in &self.entries {
            map.serialize_entry(month, value)?;
        }
        map.end()
    }
}

/// Collapses raw intervals into one value per calendar month
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAggregator;

impl ResponseAggregator {
    /// Later intervals for the same month overwrite earlier ones
    pub fn aggregate(raw: &RawIntervalResponse) -> Result<MonthlyPrediction, AggregationError> {
        let mut monthly = MonthlyPrediction::new();

        for (index, interval) in raw.intervals.iter().enumerate() {
            let from = interval
                .from_datetime
                .as_deref()
                .ok_or(AggregationError::MissingField {
                    index,
                    field: "from_datetime",
                })?;
            let value = interval.value.ok_or(AggregationError::MissingField {
                index,
                field: "value",
            })?;

            let month = month_name(from).ok_or_else(|| AggregationError::InvalidTimestamp {
                index,
                value: from.to_string(),
            })?;

            if let Some(previous) = monthly.insert(month.clone(), value) {
                warn!(
                    "Interval {} overwrites {} ({} -> {})",
                    index, month, previous, value
                );
            }
        }

        Ok(monthly)
    }
}

/// English month name for an RFC 3339, naive ISO, or bare date timestamp
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Month of an ISO 8601 timestamp, taken from its local date
fn month_name(timestamp: &str) -> Option<String> {
    let date = parse_date(timestamp.trim())?;
    Some(date.format("%B").to_string())
}

fn parse_date(timestamp: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.date_naive());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(timestamp, format) {
            return Some(dt.date_naive());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(timestamp, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(timestamp, "%Y-%m-%d").ok()
}
