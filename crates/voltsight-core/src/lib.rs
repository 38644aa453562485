//! Voltsight Core Library
//!
//! Energy-usage insights from a customer's utility bills:
//! - Provider client for customer onboarding and bill download
//! - Onboarding state machine with bounded, cancellable readiness polling
//! - Bill normalization into a prediction request
//! - Prediction service client
//! - Monthly aggregation of predicted usage
//! - Workflow orchestrating all of the above for the display layer

pub mod aggregate;
pub mod config;
pub mod error;
pub mod normalize;
pub mod onboarding;
pub mod prediction;
pub mod provider;
pub mod workflow;

/// Test utilities including mock provider and prediction servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{MonthlyPrediction, ResponseAggregator};
pub use config::Config;
pub use error::{
    AggregationError, NormalizationError, OnboardingError, PredictionError, ProviderError,
    ProviderOperation, Result, Stage, WorkflowError,
};
pub use normalize::{AnalysisWindow, BillNormalizer};
pub use onboarding::{CredentialCheck, OnboardingSession, PollPolicy, SessionState};
pub use prediction::{
    MockPrediction, PredictionClient, PredictionPayload, PredictionService, RawIntervalResponse,
    ServiceArea,
};
pub use provider::{
    Address, BillRecord, CustomerSession, CustomerStatus, MockProvider, ProviderClient,
    UtilityProvider,
};
pub use workflow::InsightsWorkflow;
