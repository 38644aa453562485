//! Bill normalization
//!
//! Turns provider bill records into the prediction service's canonical
//! payload. Pure: input records are never modified.
//!
//! Selection rules are first-match in provider order:
//! - the address comes from the first electric meter of the first bill
//! - each bill contributes at most one consumption interval, taken from its
//!   first electric meter with a complete billing period

use tracing::debug;

use crate::error::NormalizationError;
use crate::prediction::{
    Consumption, ConsumptionInterval, GroupBy, Location, PredictionParameters, PredictionPayload,
    ELECTRICITY_VARIABLE,
};
use crate::provider::{Address, BillRecord};

/// Raw provider units per kWh
const WH_PER_KWH: f64 = 1000.0;

/// Time span the prediction covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub from_datetime: String,
    pub to_datetime: String,
}

impl AnalysisWindow {
    pub const DEFAULT_YEAR: i32 = 2025;

    /// January 1 00:00:00 through December 31 23:59:59 of `year`
    pub fn calendar_year(year: i32) -> Self {
        Self {
            from_datetime: format!("{:04}-01-01T00:00:00", year),
            to_datetime: format!("{:04}-12-31T23:59:59", year),
        }
    }
}

impl Default for AnalysisWindow {
    fn default() -> Self {
        Self::calendar_year(Self::DEFAULT_YEAR)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BillNormalizer {
    window: AnalysisWindow,
}

impl BillNormalizer {
    pub fn new(window: AnalysisWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }

    /// Build a prediction payload from bills in provider order
    pub fn normalize(&self, bills: &[BillRecord]) -> Result<PredictionPayload, NormalizationError> {
        let address = service_address(bills)?;
        let actuals = consumption_actuals(bills);

        debug!(
            bills = bills.len(),
            actuals = actuals.len(),
            "Normalized bills for {}",
            self.window.from_datetime
        );

        Ok(PredictionPayload {
            parameters: PredictionParameters {
                from_datetime: self.window.from_datetime.clone(),
                to_datetime: self.window.to_datetime.clone(),
                variables: vec![ELECTRICITY_VARIABLE.to_string()],
                group_by: GroupBy::Month,
            },
            location: Location {
                address: address.single_line(),
            },
            consumption: if actuals.is_empty() {
                None
            } else {
                Some(Consumption { actuals })
            },
        })
    }
}

fn service_address(bills: &[BillRecord]) -> Result<Address, NormalizationError> {
    let first = bills.first().ok_or(NormalizationError::NoBills)?;
    if first.meters.is_empty() {
        return Err(NormalizationError::NoMeters);
    }

    first
        .first_electric_meter()
        .and_then(|meter| meter.address.as_ref())
        .ok_or(NormalizationError::NoElectricMeter)?
        .validate()
}

fn consumption_actuals(bills: &[BillRecord]) -> Vec<ConsumptionInterval> {
    bills
        .iter()
        .filter_map(|bill| {
            let raw = bill.electricity_consumption?;
            let (from, to) = bill
                .meters
                .iter()
                .filter(|m| m.is_electric())
                .find_map(|m| m.billing_period())?;

            Some(ConsumptionInterval {
                from_datetime: from.to_string(),
                to_datetime: to.to_string(),
                variable: ELECTRICITY_VARIABLE.to_string(),
                value: raw / WH_PER_KWH,
            })
        })
        .collect()
}
