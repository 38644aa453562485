//! In-memory provider for tests and offline development
//!
//! Status reads are scripted: each `fetch_status` consumes the next scripted
//! status, and the last one repeats once the script runs out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ProviderError, ProviderOperation};

use super::types::{BillRecord, CustomerSession, CustomerStatus};
use super::UtilityProvider;

#[derive(Default)]
struct MockState {
    statuses: VecDeque<CustomerStatus>,
    last_status: CustomerStatus,
    bills: Vec<BillRecord>,
    failure: Option<(ProviderOperation, u16)>,
    omit_link: bool,
    create_calls: usize,
    status_calls: usize,
    bills_calls: usize,
}

/// Scripted provider backend
///
/// Clones share state, so a test can keep a handle to inspect call counts
/// after handing the provider to a workflow.
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

pub const MOCK_CUSTOMER_ID: &str = "mock-customer";

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses returned by successive `fetch_status` calls
    pub fn with_statuses(self, statuses: Vec<CustomerStatus>) -> Self {
        {
            let mut state = self.lock();
            state.statuses = statuses.into();
        }
        self
    }

    /// Bills returned by `fetch_bills`
    pub fn with_bills(self, bills: Vec<BillRecord>) -> Self {
        self.lock().bills = bills;
        self
    }

    /// Make one operation fail with an HTTP status
    pub fn failing(self, operation: ProviderOperation, status: u16) -> Self {
        self.lock().failure = Some((operation, status));
        self
    }

    /// Create customers without an onboarding link
    pub fn without_onboarding_link(self) -> Self {
        self.lock().omit_link = true;
        self
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    pub fn bills_calls(&self) -> usize {
        self.lock().bills_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_failure(state: &MockState, operation: ProviderOperation) -> Result<(), ProviderError> {
        match state.failure {
            Some((op, status)) if op == operation => Err(ProviderError::Status {
                operation,
                status,
                body: format!(r#"{{"error": "mock {} failure"}}"#, operation),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl UtilityProvider for MockProvider {
    async fn create_customer(
        &self,
        _utility: &str,
        _email: &str,
    ) -> Result<CustomerSession, ProviderError> {
        let mut state = self.lock();
        state.create_calls += 1;
        Self::check_failure(&state, ProviderOperation::CreateCustomer)?;

        Ok(CustomerSession {
            id: MOCK_CUSTOMER_ID.to_string(),
            onboarding_link: (!state.omit_link)
                .then(|| format!("mock://provider/onboard/{}", MOCK_CUSTOMER_ID)),
            onboarding_token: Some("mock-token".to_string()),
            bills_are_ready: false,
            has_filled_credentials: false,
        })
    }

    async fn fetch_status(&self, _customer_id: &str) -> Result<CustomerStatus, ProviderError> {
        let mut state = self.lock();
        state.status_calls += 1;
        Self::check_failure(&state, ProviderOperation::FetchStatus)?;

        if let Some(next) = state.statuses.pop_front() {
            state.last_status = next;
        }
        Ok(state.last_status.clone())
    }

    async fn fetch_bills(&self, _customer_id: &str) -> Result<Vec<BillRecord>, ProviderError> {
        let mut state = self.lock();
        state.bills_calls += 1;
        Self::check_failure(&state, ProviderOperation::FetchBills)?;
        Ok(state.bills.clone())
    }

    fn base_url(&self) -> &str {
        "mock://provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_script_repeats_last() {
        let provider = MockProvider::new()
            .with_statuses(vec![CustomerStatus::pending(), CustomerStatus::ready()]);

        assert!(!provider.fetch_status("x").await.unwrap().bills_are_ready);
        assert!(provider.fetch_status("x").await.unwrap().bills_are_ready);
        assert!(provider.fetch_status("x").await.unwrap().bills_are_ready);
        assert_eq!(provider.status_calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_operation() {
        let provider = MockProvider::new().failing(ProviderOperation::FetchBills, 500);

        assert!(provider.fetch_status("x").await.is_ok());
        let err = provider.fetch_bills("x").await.unwrap_err();
        assert_eq!(err.operation(), ProviderOperation::FetchBills);
        assert_eq!(provider.bills_calls(), 1);
    }
}
