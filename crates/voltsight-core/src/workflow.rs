//! Insights workflow - the entry points the display layer calls
//!
//! Ties an onboarding session to the bill pipeline:
//! cached bills -> `BillNormalizer` -> `PredictionService` -> `ResponseAggregator`.
//! The first failing stage stops the run; no partial results are returned.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aggregate::{MonthlyPrediction, ResponseAggregator};
use crate::config::Config;
use crate::error::{Result, WorkflowError};
use crate::normalize::{AnalysisWindow, BillNormalizer};
use crate::onboarding::{CredentialCheck, OnboardingSession, PollPolicy, SessionState};
use crate::prediction::{PredictionClient, PredictionPayload, PredictionService, ServiceArea};
use crate::provider::{BillRecord, CustomerSession, ProviderClient, UtilityProvider};

/// Orchestrates onboarding and prediction for one provider/prediction pair
///
/// Generic over both services so tests can run the same flow against
/// `MockProvider` and `MockPrediction`.
pub struct InsightsWorkflow<P = ProviderClient, S = PredictionClient> {
    provider: P,
    prediction: S,
    normalizer: BillNormalizer,
    poll_policy: PollPolicy,
    utility: String,
    contact_email: String,
}

impl InsightsWorkflow {
    /// Build HTTP clients from configuration
    ///
    /// Fails with `ConfigMissing` before any remote call when a key is absent.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = ProviderClient::from_config(config)?;
        let prediction = PredictionClient::from_config(config)?;

        Ok(Self::new(provider, prediction)
            .with_analysis_window(config.analysis_window())
            .with_poll_policy(config.poll_policy()?)
            .with_customer_defaults(&config.customer.utility, &config.customer.contact_email))
    }
}

impl<P, S> InsightsWorkflow<P, S>
where
    P: UtilityProvider,
    S: PredictionService,
{
    pub fn new(provider: P, prediction: S) -> Self {
        let customer = crate::config::CustomerConfig::default();
        Self {
            provider,
            prediction,
            normalizer: BillNormalizer::default(),
            poll_policy: PollPolicy::default(),
            utility: customer.utility,
            contact_email: customer.contact_email,
        }
    }

    pub fn with_analysis_window(mut self, window: AnalysisWindow) -> Self {
        self.normalizer = BillNormalizer::new(window);
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Utility and contact email used by `connect`
    pub fn with_customer_defaults(mut self, utility: &str, contact_email: &str) -> Self {
        self.utility = utility.to_string();
        self.contact_email = contact_email.to_string();
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn prediction(&self) -> &S {
        &self.prediction
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    pub fn utility(&self) -> &str {
        &self.utility
    }

    /// Create the provider customer with the configured utility and email
    pub async fn connect(&self, session: &mut OnboardingSession) -> Result<CustomerSession> {
        self.connect_with(session, &self.utility, &self.contact_email)
            .await
    }

    /// Create the provider customer for an explicit utility and email
    pub async fn connect_with(
        &self,
        session: &mut OnboardingSession,
        utility: &str,
        email: &str,
    ) -> Result<CustomerSession> {
        let customer = session.start(&self.provider, utility, email).await?;
        Ok(customer.clone())
    }

    pub fn skip(&self, session: &mut OnboardingSession) -> Result<()> {
        session.skip()?;
        Ok(())
    }

    pub async fn confirm_credentials(
        &self,
        session: &mut OnboardingSession,
    ) -> Result<CredentialCheck> {
        Ok(session.confirm_credentials(&self.provider).await?)
    }

    /// Poll for bill readiness with the workflow's policy; returns the bill count
    pub async fn await_bills(
        &self,
        session: &mut OnboardingSession,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let bills = session
            .await_bills(&self.provider, &self.poll_policy, cancel)
            .await?;
        Ok(bills.len())
    }

    /// Predict monthly usage from a session's downloaded bills
    pub async fn generate_insights(&self, session: &OnboardingSession) -> Result<MonthlyPrediction> {
        let bills = match (session.state(), session.bills()) {
            (SessionState::BillsReady, Some(bills)) => bills,
            (state, _) => return Err(WorkflowError::NotReady { state }),
        };
        self.predict_from_bills(bills).await
    }

    /// Run the normalize, submit, aggregate pipeline over a set of bills
    pub async fn predict_from_bills(&self, bills: &[BillRecord]) -> Result<MonthlyPrediction> {
        let payload = self.normalize(bills)?;

        info!(
            "Submitting prediction for {} ({} actuals) to {}",
            payload.location.address,
            payload.actuals_len(),
            self.prediction.endpoint()
        );
        let raw = self.prediction.submit(&payload).await?;

        let monthly = ResponseAggregator::aggregate(&raw)?;
        info!(
            months = monthly.len(),
            "Predicted {:.2} kWh annual usage",
            monthly.annual_total()
        );
        Ok(monthly)
    }

    pub fn normalize(&self, bills: &[BillRecord]) -> Result<PredictionPayload> {
        Ok(self.normalizer.normalize(bills)?)
    }

    pub async fn check_service_area(
        &self,
        lat: f64,
        lon: f64,
        postal_code: &str,
    ) -> Result<ServiceArea> {
        Ok(self
            .prediction
            .check_service_area(lat, lon, postal_code)
            .await?)
    }
}
