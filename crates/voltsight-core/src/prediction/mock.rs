//! Scripted prediction service for tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::PredictionError;

use super::types::{PredictionPayload, RawInterval, RawIntervalResponse, ServiceArea};
use super::PredictionService;

#[derive(Default)]
struct MockState {
    response: RawIntervalResponse,
    failure: Option<u16>,
    submitted: Vec<PredictionPayload>,
}

/// Prediction backend returning a fixed response and recording every payload
#[derive(Clone, Default)]
pub struct MockPrediction {
    state: Arc<Mutex<MockState>>,
}

impl MockPrediction {
    /// Twelve monthly intervals for 2025, valued 100.0 through 1200.0
    pub fn new() -> Self {
        let intervals = (1..=12)
            .map(|month| RawInterval {
                from_datetime: Some(format!("2025-{:02}-01T00:00:00", month)),
                to_datetime: None,
                value: Some(month as f64 * 100.0),
            })
            .collect();
        Self::with_response(RawIntervalResponse { intervals })
    }

    pub fn with_response(response: RawIntervalResponse) -> Self {
        let mock = Self::default();
        mock.lock().response = response;
        mock
    }

    /// Fail every submission with an HTTP status
    pub fn failing(status: u16) -> Self {
        let mock = Self::default();
        mock.lock().failure = Some(status);
        mock
    }

    /// Payloads received so far, in order
    pub fn submitted(&self) -> Vec<PredictionPayload> {
        self.lock().submitted.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PredictionService for MockPrediction {
    async fn submit(
        &self,
        payload: &PredictionPayload,
    ) -> Result<RawIntervalResponse, PredictionError> {
        let mut state = self.lock();
        state.submitted.push(payload.clone());

        if let Some(status) = state.failure {
            return Err(PredictionError::Status {
                status,
                body: r#"{"error": "mock prediction failure"}"#.to_string(),
            });
        }
        Ok(state.response.clone())
    }

    async fn check_service_area(
        &self,
        lat: f64,
        lon: f64,
        postal_code: &str,
    ) -> Result<ServiceArea, PredictionError> {
        Ok(serde_json::json!({
            "lat": lat,
            "lon": lon,
            "postalCode": postal_code,
            "serviced": true
        }))
    }

    fn endpoint(&self) -> &str {
        "mock://prediction"
    }
}
