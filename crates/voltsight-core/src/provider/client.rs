//! HTTP client for the utility-data provider API
//!
//! Authenticates with the API key as the basic-auth username and an empty
//! password. Every request goes through one `reqwest::Client` configured with
//! a finite timeout.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{ProviderError, ProviderOperation, Result, WorkflowError};

use super::types::{BillRecord, CustomerSession, CustomerStatus};
use super::UtilityProvider;

/// Provider API client
#[derive(Clone)]
pub struct ProviderClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

/// Body of `POST /customers`
#[derive(Debug, Serialize)]
struct CreateCustomerRequest<'a> {
    utility: &'a str,
    email: &'a str,
}

impl ProviderClient {
    /// Create a client with its own connection pool and request timeout
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkflowError::InvalidConfig(format!("provider HTTP client: {}", e)))?;
        Ok(Self::with_client(http_client, base_url, api_key))
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_client(http_client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from configuration; fails before any request if the key is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_provider_key()?;
        Self::new(&config.provider_base_url(), api_key, config.http_timeout()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: ProviderOperation,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .basic_auth(&self.api_key, Some(""))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(operation, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(operation, e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        debug!(operation = %operation, "Provider response: {}", body);

        serde_json::from_str(&body).map_err(|source| ProviderError::MalformedBody {
            operation,
            source,
            body,
        })
    }
}

#[async_trait]
impl UtilityProvider for ProviderClient {
    async fn create_customer(
        &self,
        utility: &str,
        email: &str,
    ) -> Result<CustomerSession, ProviderError> {
        let request = self
            .http_client
            .post(self.url("/customers"))
            .json(&CreateCustomerRequest { utility, email });

        self.send(ProviderOperation::CreateCustomer, request).await
    }

    async fn fetch_status(&self, customer_id: &str) -> Result<CustomerStatus, ProviderError> {
        let request = self
            .http_client
            .get(self.url(&format!("/customers/{}", customer_id)));

        self.send(ProviderOperation::FetchStatus, request).await
    }

    async fn fetch_bills(&self, customer_id: &str) -> Result<Vec<BillRecord>, ProviderError> {
        let request = self
            .http_client
            .get(self.url(&format!("/customers/{}/bills", customer_id)));

        self.send(ProviderOperation::FetchBills, request).await
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
