//! Integration tests for voltsight-core
//!
//! These tests exercise the full connect → poll → normalize → predict →
//! aggregate workflow against the in-memory provider and prediction backends.

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use voltsight_core::{
    prediction::{RawInterval, RawIntervalResponse},
    AnalysisWindow, BillNormalizer, BillRecord, CredentialCheck, CustomerStatus, InsightsWorkflow,
    MockPrediction, MockProvider, OnboardingError, OnboardingSession, PollPolicy, SessionState,
    Stage, WorkflowError,
};

/// Two bills as the provider returns them:
/// - Bill A carries the service address but no consumption
/// - Bill B carries 12000 Wh for January but no address
fn provider_bills_json() -> serde_json::Value {
    json!([
        {
            "id": 9001,
            "bill_date": "2025-01-05",
            "electricity_consumption": null,
            "meters": [
                {"id": "gas-1", "type": "gas"},
                {
                    "id": "elec-1",
                    "type": "electric",
                    "address": {
                        "line_1": "123 Main St",
                        "line_2": "",
                        "city": "Springfield",
                        "state": "IL",
                        "postal_code": "62701"
                    }
                }
            ]
        },
        {
            "id": 9002,
            "bill_date": "2025-02-05",
            "electricity_consumption": 12000,
            "meters": [
                {
                    "id": "elec-1",
                    "type": "electric",
                    "billing_period_from": "2025-01-01T00:00:00",
                    "billing_period_to": "2025-01-31T00:00:00"
                }
            ]
        }
    ])
}

fn provider_bills() -> Vec<BillRecord> {
    serde_json::from_value(provider_bills_json()).expect("Failed to parse provider bills")
}

fn quick_policy() -> PollPolicy {
    PollPolicy::fixed(Duration::from_millis(1), Duration::from_secs(5))
}

// =============================================================================
// Normalization
// =============================================================================

#[test]
fn test_provider_bills_normalize_to_payload() {
    let payload = BillNormalizer::default()
        .normalize(&provider_bills())
        .expect("Failed to normalize bills");

    let body = serde_json::to_value(&payload).unwrap();
    assert_eq!(
        body,
        json!({
            "parameters": {
                "from_datetime": "2025-01-01T00:00:00",
                "to_datetime": "2025-12-31T23:59:59",
                "variables": ["consumption.electricity"],
                "group_by": "month"
            },
            "location": {"address": "123 Main St, Springfield, IL 62701"},
            "consumption": {
                "actuals": [{
                    "from_datetime": "2025-01-01T00:00:00",
                    "to_datetime": "2025-01-31T00:00:00",
                    "variable": "consumption.electricity",
                    "value": 12.0
                }]
            }
        })
    );
}

#[test]
fn test_configured_year_changes_window_only() {
    let payload = BillNormalizer::new(AnalysisWindow::calendar_year(2026))
        .normalize(&provider_bills())
        .unwrap();

    assert_eq!(payload.parameters.to_datetime, "2026-12-31T23:59:59");
    assert_eq!(payload.actuals_len(), 1);
}

// =============================================================================
// Full Workflow
// =============================================================================

#[tokio::test]
async fn test_connect_to_insights() {
    let provider = MockProvider::new()
        .with_statuses(vec![
            CustomerStatus::pending(),
            CustomerStatus::credentials_filled(),
            CustomerStatus::credentials_filled(),
            CustomerStatus::credentials_filled(),
            CustomerStatus::ready(),
        ])
        .with_bills(provider_bills());
    let prediction = MockPrediction::new();
    let workflow = InsightsWorkflow::new(provider.clone(), prediction.clone())
        .with_poll_policy(quick_policy());

    let mut session = OnboardingSession::new();
    let customer = workflow.connect(&mut session).await.unwrap();
    assert!(customer.onboarding_link.is_some());

    // First confirmation comes back pending; the user retries
    assert_eq!(
        workflow.confirm_credentials(&mut session).await.unwrap(),
        CredentialCheck::Pending
    );
    assert_eq!(
        workflow.confirm_credentials(&mut session).await.unwrap(),
        CredentialCheck::Confirmed
    );

    let bill_count = workflow
        .await_bills(&mut session, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(bill_count, 2);
    assert_eq!(session.state(), SessionState::BillsReady);
    assert_eq!(provider.bills_calls(), 1);

    let monthly = workflow.generate_insights(&session).await.unwrap();
    assert_eq!(monthly.len(), 12);
    assert_eq!(monthly.iter().next(), Some(("January", 100.0)));
    assert_eq!(monthly.annual_total(), 7800.0);

    let submitted = prediction.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        submitted[0].location.address,
        "123 Main St, Springfield, IL 62701"
    );
}

#[tokio::test]
async fn test_colliding_months_keep_last_value() {
    let response = RawIntervalResponse {
        intervals: vec![
            RawInterval {
                from_datetime: Some("2025-03-01T00:00:00".into()),
                to_datetime: None,
                value: Some(10.0),
            },
            RawInterval {
                from_datetime: Some("2026-03-01T00:00:00".into()),
                to_datetime: None,
                value: Some(20.0),
            },
        ],
    };
    let workflow = InsightsWorkflow::new(
        MockProvider::new(),
        MockPrediction::with_response(response),
    );

    let monthly = workflow.predict_from_bills(&provider_bills()).await.unwrap();
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly.get("March"), Some(20.0));
}

#[tokio::test]
async fn test_skip_then_insights_not_ready() {
    let provider = MockProvider::new();
    let prediction = MockPrediction::new();
    let workflow = InsightsWorkflow::new(provider.clone(), prediction.clone());

    let mut session = OnboardingSession::new();
    workflow.skip(&mut session).unwrap();
    assert_eq!(session.state(), SessionState::Skipped);

    let err = workflow.generate_insights(&session).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotReady { .. }));
    assert_eq!(provider.create_calls(), 0);
    assert!(prediction.submitted().is_empty());
}

#[tokio::test]
async fn test_never_ready_times_out_without_download() {
    let provider = MockProvider::new().with_statuses(vec![CustomerStatus::credentials_filled()]);
    let workflow = InsightsWorkflow::new(provider.clone(), MockPrediction::new()).with_poll_policy(
        PollPolicy::fixed(Duration::from_millis(2), Duration::from_millis(20)),
    );

    let mut session = OnboardingSession::new();
    workflow.connect(&mut session).await.unwrap();
    workflow.confirm_credentials(&mut session).await.unwrap();

    let err = workflow
        .await_bills(&mut session, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Onboarding);
    assert!(matches!(
        err,
        WorkflowError::Onboarding(OnboardingError::PollTimeout { .. })
    ));
    assert_eq!(provider.bills_calls(), 0);

    // still polling; a later attempt may succeed
    assert_eq!(session.state(), SessionState::PollingBillReadiness);
}

#[tokio::test]
async fn test_service_area_lookup() {
    let workflow = InsightsWorkflow::new(MockProvider::new(), MockPrediction::new());

    let area = workflow
        .check_service_area(37.7749, -122.4194, "94103")
        .await
        .unwrap();
    assert_eq!(area["postalCode"], json!("94103"));
    assert_eq!(area["serviced"], json!(true));
}
