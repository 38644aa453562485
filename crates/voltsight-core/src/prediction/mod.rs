//! Prediction service access
//!
//! - `PredictionService` trait: submit a payload, look up a service area
//! - `PredictionClient`: HTTP implementation
//! - `MockPrediction`: scripted implementation for tests

mod client;
mod mock;
pub mod types;

pub use client::PredictionClient;
pub use mock::MockPrediction;
pub use types::*;

use async_trait::async_trait;

use crate::error::PredictionError;

/// Interface to the prediction service
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Submit a normalized payload and return the raw predicted intervals
    async fn submit(
        &self,
        payload: &PredictionPayload,
    ) -> Result<RawIntervalResponse, PredictionError>;

    /// Check whether the service covers a location
    async fn check_service_area(
        &self,
        lat: f64,
        lon: f64,
        postal_code: &str,
    ) -> Result<ServiceArea, PredictionError>;

    /// Calculation endpoint (for logging)
    fn endpoint(&self) -> &str;
}
