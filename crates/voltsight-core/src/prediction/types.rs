//! Prediction service request and response types

use serde::{Deserialize, Serialize};

/// Variable name for electricity consumption, in requests and actuals
pub const ELECTRICITY_VARIABLE: &str = "consumption.electricity";

/// Canonical request body for the prediction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPayload {
    pub parameters: PredictionParameters,
    pub location: Location,
    /// Omitted entirely when there are no actuals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption: Option<Consumption>,
}

impl PredictionPayload {
    /// Number of historical intervals attached
    pub fn actuals_len(&self) -> usize {
        self.consumption.as_ref().map_or(0, |c| c.actuals.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionParameters {
    pub from_datetime: String,
    pub to_datetime: String,
    pub variables: Vec<String>,
    pub group_by: GroupBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Month,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    pub actuals: Vec<ConsumptionInterval>,
}

/// One billed period of historical consumption, in kWh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionInterval {
    pub from_datetime: String,
    pub to_datetime: String,
    pub variable: String,
    pub value: f64,
}

/// One predicted interval as returned by the service
///
/// Fields are optional here; the aggregator decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInterval {
    #[serde(default)]
    pub from_datetime: Option<String>,
    #[serde(default)]
    pub to_datetime: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// `data.intervals` from a prediction response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawIntervalResponse {
    pub intervals: Vec<RawInterval>,
}

/// Service-area lookup result, passed through untouched
pub type ServiceArea = serde_json::Value;

/// Response envelope: `{ "data": { "intervals": [...] } }`
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(default)]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseData {
    #[serde(default)]
    pub intervals: Option<Vec<RawInterval>>,
}
