//! Error types for Voltsight
//!
//! Each component owns its failure enum. `WorkflowError` wraps them and
//! remembers which stage produced the failure, so the display layer can say
//! where things went wrong without inspecting message text.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::onboarding::SessionState;

/// Provider API call that triggered a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOperation {
    CreateCustomer,
    FetchStatus,
    FetchBills,
}

impl ProviderOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderOperation::CreateCustomer => "create_customer",
            ProviderOperation::FetchStatus => "fetch_status",
            ProviderOperation::FetchBills => "fetch_bills",
        }
    }
}

impl fmt::Display for ProviderOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failures talking to the utility-data provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{operation} timed out")]
    Timeout { operation: ProviderOperation },

    #[error("{operation} request failed: {source}")]
    Transport {
        operation: ProviderOperation,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: ProviderOperation,
        status: u16,
        body: String,
    },

    #[error("{operation} returned a malformed body: {source}")]
    MalformedBody {
        operation: ProviderOperation,
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl ProviderError {
    /// Classify a reqwest failure, keeping timeouts distinct from other transport errors
    pub fn from_reqwest(operation: ProviderOperation, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { operation }
        } else {
            ProviderError::Transport {
                operation,
                source: err,
            }
        }
    }

    /// The provider call that failed
    pub fn operation(&self) -> ProviderOperation {
        match self {
            ProviderError::Timeout { operation }
            | ProviderError::Transport { operation, .. }
            | ProviderError::Status { operation, .. }
            | ProviderError::MalformedBody { operation, .. } => *operation,
        }
    }

    /// Upstream response body, when the provider sent one
    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            ProviderError::Status { body, .. } | ProviderError::MalformedBody { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }
}

/// Failures talking to the prediction service
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("prediction request timed out")]
    Timeout,

    #[error("prediction request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("prediction service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed prediction response: {0}")]
    MalformedResponse(String),
}

impl PredictionError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PredictionError::Timeout
        } else {
            PredictionError::Transport(err)
        }
    }
}

/// Bill data that cannot be turned into a prediction payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("no bills available")]
    NoBills,

    #[error("no meters found in the first bill")]
    NoMeters,

    #[error("no electric meter with an address found")]
    NoElectricMeter,

    #[error("electric meter address is missing `{field}`")]
    IncompleteAddress { field: &'static str },
}

/// Prediction intervals that cannot be turned into a monthly mapping
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("interval {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("interval {index} has an unparseable from_datetime: {value}")]
    InvalidTimestamp { index: usize, value: String },
}

/// Onboarding state machine failures
#[derive(Error, Debug)]
pub enum OnboardingError {
    #[error("cannot {operation} while session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    #[error("provider created customer {customer_id} without an onboarding link")]
    MissingOnboardingLink { customer_id: String },

    #[error("invalid poll policy: {0}")]
    InvalidPolicy(&'static str),

    #[error("bills not ready after {checks} status checks ({waited:?})")]
    PollTimeout { checks: u32, waited: Duration },

    #[error("bill readiness polling cancelled after {checks} status checks")]
    Cancelled { checks: u32 },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Component that produced a workflow failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Workflow,
    Onboarding,
    Provider,
    Prediction,
    Normalization,
    Aggregation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Workflow => "workflow",
            Stage::Onboarding => "onboarding",
            Stage::Provider => "provider",
            Stage::Prediction => "prediction",
            Stage::Normalization => "normalization",
            Stage::Aggregation => "aggregation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Top-level error surfaced to the display layer
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("insights unavailable: session is {state}, bills are not ready")]
    NotReady { state: SessionState },

    #[error("missing configuration: {0} is not set")]
    ConfigMissing(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("onboarding: {0}")]
    Onboarding(#[from] OnboardingError),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("prediction: {0}")]
    Prediction(#[from] PredictionError),

    #[error("normalization: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("aggregation: {0}")]
    Aggregation(#[from] AggregationError),
}

impl WorkflowError {
    /// Which component produced this failure
    pub fn stage(&self) -> Stage {
        match self {
            WorkflowError::NotReady { .. } => Stage::Workflow,
            WorkflowError::ConfigMissing(_) | WorkflowError::InvalidConfig(_) => Stage::Config,
            WorkflowError::Onboarding(_) => Stage::Onboarding,
            WorkflowError::Provider(_) => Stage::Provider,
            WorkflowError::Prediction(_) => Stage::Prediction,
            WorkflowError::Normalization(_) => Stage::Normalization,
            WorkflowError::Aggregation(_) => Stage::Aggregation,
        }
    }

    /// Upstream diagnostic payload, if the failing service sent one
    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            WorkflowError::Provider(e) => e.upstream_body(),
            WorkflowError::Onboarding(OnboardingError::Provider(e)) => e.upstream_body(),
            WorkflowError::Prediction(PredictionError::Status { body, .. }) => Some(body),
            _ => None,
        }
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
