//! HTTP client for the prediction service
//!
//! The API key travels in the `X-API-Key` header and never appears in URLs or
//! error messages.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use crate::config::Config;
use crate::error::{PredictionError, Result, WorkflowError};

use super::types::{PredictionPayload, RawIntervalResponse, ResponseEnvelope, ServiceArea};
use super::PredictionService;

const API_KEY_HEADER: &str = "X-API-Key";

/// Prediction service client
#[derive(Clone)]
pub struct PredictionClient {
    http_client: Client,
    calculate_url: String,
    api_key: String,
}

impl fmt::Debug for PredictionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionClient")
            .field("calculate_url", &self.calculate_url)
            .field("api_key", &"***")
            .finish()
    }
}

impl PredictionClient {
    /// Create a client for the given calculation endpoint
    pub fn new(calculate_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            WorkflowError::InvalidConfig(format!("prediction HTTP client: {}", e))
        })?;
        Ok(Self::with_client(http_client, calculate_url, api_key))
    }

    pub fn with_client(http_client: Client, calculate_url: &str, api_key: &str) -> Self {
        Self {
            http_client,
            calculate_url: calculate_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from configuration; fails before any request if the key is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_prediction_key()?;
        Self::new(&config.prediction.url, api_key, config.http_timeout()?)
    }

    /// Send a request and return the body of a successful response
    async fn send(&self, request: RequestBuilder) -> Result<String, PredictionError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(PredictionError::from_reqwest)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(PredictionError::from_reqwest)?;

        if !status.is_success() {
            return Err(PredictionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

/// Pull `data.intervals` out of a response body, refusing anything else
pub(crate) fn parse_intervals(body: &str) -> Result<RawIntervalResponse, PredictionError> {
    let envelope: ResponseEnvelope = serde_json::from_str(body)
        .map_err(|e| PredictionError::MalformedResponse(e.to_string()))?;

    let intervals = envelope
        .data
        .and_then(|d| d.intervals)
        .ok_or_else(|| PredictionError::MalformedResponse("missing data.intervals".into()))?;

    Ok(RawIntervalResponse { intervals })
}

#[async_trait]
impl PredictionService for PredictionClient {
    async fn submit(
        &self,
        payload: &PredictionPayload,
    ) -> Result<RawIntervalResponse, PredictionError> {
        debug!(
            actuals = payload.actuals_len(),
            "Prediction payload: {}",
            serde_json::to_string(payload).unwrap_or_default()
        );

        let body = self
            .send(self.http_client.post(&self.calculate_url).json(payload))
            .await?;
        debug!("Prediction response: {}", body);

        parse_intervals(&body)
    }

    async fn check_service_area(
        &self,
        lat: f64,
        lon: f64,
        postal_code: &str,
    ) -> Result<ServiceArea, PredictionError> {
        let lat = lat.to_string();
        let lon = lon.to_string();
        let request = self
            .http_client
            .get(format!("{}/service-area", self.calculate_url))
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("postalCode", postal_code),
            ]);

        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| PredictionError::MalformedResponse(e.to_string()))
    }

    fn endpoint(&self) -> &str {
        &self.calculate_url
    }
}
