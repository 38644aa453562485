//! Utility-data provider access
//!
//! - `UtilityProvider` trait: the three calls the onboarding flow needs
//! - `ProviderClient`: HTTP implementation
//! - `MockProvider`: scripted in-memory implementation
//!
//! Nothing in here retries. Retry and wait policy belongs to the onboarding
//! session.

mod client;
mod mock;
pub mod types;

pub use client::ProviderClient;
pub use mock::{MockProvider, MOCK_CUSTOMER_ID};
pub use types::*;

use async_trait::async_trait;

use crate::error::ProviderError;

/// Interface to the utility-data provider
#[async_trait]
pub trait UtilityProvider: Send + Sync {
    /// Create a customer account. Not idempotent: every call creates a new account.
    async fn create_customer(
        &self,
        utility: &str,
        email: &str,
    ) -> Result<CustomerSession, ProviderError>;

    /// Read onboarding and bill readiness flags
    async fn fetch_status(&self, customer_id: &str) -> Result<CustomerStatus, ProviderError>;

    /// Download all bills for a customer, in provider order
    async fn fetch_bills(&self, customer_id: &str) -> Result<Vec<BillRecord>, ProviderError>;

    /// Base URL (for logging)
    fn base_url(&self) -> &str;
}
