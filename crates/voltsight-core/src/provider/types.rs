//! Utility-data provider records
//!
//! Provider schemas vary by utility, so everything except the fields the
//! pipeline actually reads is kept as loose JSON.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::NormalizationError;

/// Customer account created at the provider for one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSession {
    /// Provider-assigned identifier (numeric ids are stringified)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub onboarding_link: Option<String>,
    #[serde(default)]
    pub onboarding_token: Option<String>,
    #[serde(default, deserialize_with = "bool_or_null")]
    pub bills_are_ready: bool,
    #[serde(default, deserialize_with = "bool_or_null")]
    pub has_filled_credentials: bool,
}

impl CustomerSession {
    /// Refresh the mutable flags from a status read. The id never changes.
    pub fn apply_status(&mut self, status: &CustomerStatus) {
        self.bills_are_ready = status.bills_are_ready;
        self.has_filled_credentials = status.has_filled_credentials;
        if status.onboarding_link.is_some() {
            self.onboarding_link = status.onboarding_link.clone();
        }
        if status.onboarding_token.is_some() {
            self.onboarding_token = status.onboarding_token.clone();
        }
    }
}

/// Result of `GET /customers/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerStatus {
    #[serde(default, deserialize_with = "bool_or_null")]
    pub bills_are_ready: bool,
    #[serde(default, deserialize_with = "bool_or_null")]
    pub has_filled_credentials: bool,
    #[serde(default)]
    pub onboarding_link: Option<String>,
    #[serde(default)]
    pub onboarding_token: Option<String>,
}

impl CustomerStatus {
    /// Customer has not finished the onboarding form
    pub fn pending() -> Self {
        Self::default()
    }

    /// Credentials filled in, bills still processing
    pub fn credentials_filled() -> Self {
        Self {
            has_filled_credentials: true,
            ..Self::default()
        }
    }

    /// Bills available for download
    pub fn ready() -> Self {
        Self {
            bills_are_ready: true,
            has_filled_credentials: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterType {
    Electric,
    /// Gas, water, and anything else the provider reports
    #[default]
    #[serde(other)]
    Other,
}

/// Address as reported on a meter; every field may be absent upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterAddress {
    #[serde(default)]
    pub line_1: Option<String>,
    #[serde(default)]
    pub line_2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl MeterAddress {
    /// Check required sub-fields and produce a validated `Address`
    pub fn validate(&self) -> Result<Address, NormalizationError> {
        fn required(
            value: &Option<String>,
            field: &'static str,
        ) -> Result<String, NormalizationError> {
            match value.as_deref() {
                Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
                _ => Err(NormalizationError::IncompleteAddress { field }),
            }
        }

        Ok(Address {
            line_1: required(&self.line_1, "line_1")?,
            line_2: self
                .line_2
                .clone()
                .filter(|s| !s.is_empty()),
            city: required(&self.city, "city")?,
            state: required(&self.state, "state")?,
            postal_code: required(&self.postal_code, "postal_code")?,
        })
    }
}

/// Validated service address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line_1: String,
    pub line_2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl Address {
    /// `line_1[ line_2], city, state postal_code`
    pub fn single_line(&self) -> String {
        let mut line = self.line_1.clone();
        if let Some(ref line_2) = self.line_2 {
            line.push(' ');
            line.push_str(line_2);
        }
        format!(
            "{}, {}, {} {}",
            line, self.city, self.state, self.postal_code
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterRecord {
    #[serde(rename = "type", default)]
    pub meter_type: MeterType,
    #[serde(default)]
    pub billing_period_from: Option<String>,
    #[serde(default)]
    pub billing_period_to: Option<String>,
    #[serde(default)]
    pub address: Option<MeterAddress>,
    /// Remaining provider fields, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MeterRecord {
    pub fn is_electric(&self) -> bool {
        self.meter_type == MeterType::Electric
    }

    /// Billing period, only when both ends are present and non-empty
    pub fn billing_period(&self) -> Option<(&str, &str)> {
        let from = self.billing_period_from.as_deref().filter(|s| !s.is_empty())?;
        let to = self.billing_period_to.as_deref().filter(|s| !s.is_empty())?;
        Some((from, to))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    #[serde(default, deserialize_with = "vec_or_null")]
    pub meters: Vec<MeterRecord>,
    /// Total electricity consumption in raw provider units (Wh)
    #[serde(default, deserialize_with = "optional_number")]
    pub electricity_consumption: Option<f64>,
    /// Billing metadata (ids, dates, amounts) kept verbatim
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl BillRecord {
    /// First electric meter in provider order
    pub fn first_electric_meter(&self) -> Option<&MeterRecord> {
        self.meters.iter().find(|m| m.is_electric())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn bool_or_null<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn vec_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Consumption arrives as a number or a numeric string depending on the utility
fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| de::Error::custom("consumption out of range")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid consumption {:?}: {}", s, e))),
        Some(other) => Err(de::Error::custom(format!(
            "expected numeric consumption, got {}",
            other
        ))),
    }
}
