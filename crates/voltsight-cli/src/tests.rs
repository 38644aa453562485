//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::{Cursor, Write};
use std::time::Duration;

use serde_json::json;
use voltsight_core::{
    Config, CustomerStatus, InsightsWorkflow, MockPrediction, MockProvider, MonthlyPrediction,
    PollPolicy,
};

use crate::commands::{self, PollInterrupt, RECOMMENDATIONS};

fn bills_file(contents: &serde_json::Value) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

fn sample_bills() -> serde_json::Value {
    json!([{
        "id": 1,
        "electricity_consumption": 450000,
        "meters": [{
            "type": "electric",
            "billing_period_from": "2025-01-01T00:00:00",
            "billing_period_to": "2025-01-31T00:00:00",
            "address": {
                "line_1": "500 Market St",
                "city": "San Francisco",
                "state": "CA",
                "postal_code": "94105"
            }
        }]
    }])
}

fn mock_workflow(provider: MockProvider) -> InsightsWorkflow<MockProvider, MockPrediction> {
    InsightsWorkflow::new(provider, MockPrediction::new())
        .with_poll_policy(PollPolicy::fixed(Duration::from_millis(1), Duration::from_secs(5)))
}

// ========== Display Tests ==========

#[test]
fn test_render_insights_table() {
    let mut monthly = MonthlyPrediction::new();
    monthly.insert("January", 410.25);
    monthly.insert("February", 380.5);

    let rendered = commands::render_insights(&monthly);
    assert!(rendered.contains("Predicted annual usage: 790.75 kWh"));
    assert!(rendered.contains("410.25"));
    assert!(rendered.contains("380.50"));
    assert!(rendered.find("January").unwrap() < rendered.find("February").unwrap());
    for recommendation in RECOMMENDATIONS {
        assert!(rendered.contains(recommendation));
    }
}

#[test]
fn test_render_empty_insights() {
    let rendered = commands::render_insights(&MonthlyPrediction::new());
    assert!(rendered.contains("no monthly data"));
    assert!(!rendered.contains("Recommendations"));
}

// ========== Bill File Tests ==========

#[test]
fn test_read_bills() {
    let file = bills_file(&sample_bills());
    let bills = commands::read_bills(file.path()).unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].electricity_consumption, Some(450000.0));
}

#[test]
fn test_read_bills_rejects_object() {
    let file = bills_file(&json!({"bills": []}));
    let err = commands::read_bills(file.path()).unwrap_err();
    assert!(err.to_string().contains("Invalid bills JSON"));
}

#[test]
fn test_read_bills_missing_file() {
    let result = commands::read_bills(std::path::Path::new("/nonexistent/bills.json"));
    assert!(result.is_err());
}

#[test]
fn test_cmd_normalize() {
    let file = bills_file(&sample_bills());
    let result = commands::cmd_normalize(&Config::default(), file.path());
    assert!(result.is_ok());
}

#[test]
fn test_cmd_normalize_without_electric_meter() {
    let file = bills_file(&json!([{"meters": [{"type": "gas"}]}]));
    let err = commands::cmd_normalize(&Config::default(), file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("no electric meter"));
}

#[tokio::test]
async fn test_cmd_predict_requires_keys() {
    let file = bills_file(&sample_bills());
    let err = commands::cmd_predict(&Config::default(), file.path())
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("PROVIDER_API_KEY"));
}

// ========== Connect Flow Tests ==========

#[tokio::test]
async fn test_run_connect_to_insights() {
    let provider = MockProvider::new()
        .with_statuses(vec![
            CustomerStatus::pending(),
            CustomerStatus::credentials_filled(),
            CustomerStatus::ready(),
        ])
        .with_bills(serde_json::from_value(sample_bills()).unwrap());
    let workflow = mock_workflow(provider.clone());

    // accept, then press Enter twice (first check is still pending)
    let mut input = Cursor::new("y\n\n\n");
    let monthly = commands::run_connect(
        &workflow,
        &mut input,
        "pacific_gas_and_electric",
        "test@example.com",
        false,
        &PollInterrupt::new(),
    )
    .await
    .unwrap()
    .expect("insights");

    assert_eq!(monthly.len(), 12);
    assert_eq!(provider.create_calls(), 1);
    assert_eq!(provider.bills_calls(), 1);
}

#[tokio::test]
async fn test_run_connect_skip() {
    let provider = MockProvider::new();
    let workflow = mock_workflow(provider.clone());

    let mut input = Cursor::new("n\n");
    let result = commands::run_connect(
        &workflow,
        &mut input,
        "pge",
        "a@b.c",
        false,
        &PollInterrupt::new(),
    )
    .await
    .unwrap();

    assert!(result.is_none());
    assert_eq!(provider.create_calls(), 0);
}

#[tokio::test]
async fn test_run_connect_input_closed() {
    let workflow = mock_workflow(MockProvider::new());

    let mut input = Cursor::new("\n");
    let err = commands::run_connect(
        &workflow,
        &mut input,
        "pge",
        "a@b.c",
        false,
        &PollInterrupt::new(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Input closed"));
}

#[tokio::test]
async fn test_run_connect_cancelled_while_polling() {
    let provider = MockProvider::new().with_statuses(vec![CustomerStatus::credentials_filled()]);
    let workflow = mock_workflow(provider.clone());
    let interrupt = PollInterrupt::new();

    // keep interrupting until polling is running
    let ctrl_c = interrupt.clone();
    tokio::spawn(async move {
        while !ctrl_c.interrupt() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    let mut input = Cursor::new("\n\n");
    let result = commands::run_connect(&workflow, &mut input, "pge", "a@b.c", false, &interrupt)
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(provider.status_calls() >= 2);
    assert_eq!(provider.bills_calls(), 0);
}

#[tokio::test]
async fn test_interrupt_before_polling_is_not_handled() {
    let provider = MockProvider::new()
        .with_statuses(vec![CustomerStatus::credentials_filled(), CustomerStatus::ready()])
        .with_bills(serde_json::from_value(sample_bills()).unwrap());
    let workflow = mock_workflow(provider.clone());
    let interrupt = PollInterrupt::new();

    // Ctrl-C at a prompt is left to the caller and must not stop polling later
    assert!(!interrupt.interrupt());

    let mut input = Cursor::new("\n\n");
    let monthly = commands::run_connect(&workflow, &mut input, "pge", "a@b.c", false, &interrupt)
        .await
        .unwrap();

    assert_eq!(monthly.map(|m| m.len()), Some(12));
    assert_eq!(provider.bills_calls(), 1);
    assert!(!interrupt.interrupt());
}

#[tokio::test]
async fn test_run_connect_declined_answers() {
    for answer in ["n\n", "No\n", ""] {
        let provider = MockProvider::new();
        let workflow = mock_workflow(provider.clone());

        let mut input = Cursor::new(answer);
        let result = commands::run_connect(
            &workflow,
            &mut input,
            "pge",
            "a@b.c",
            false,
            &PollInterrupt::new(),
        )
        .await
        .unwrap();

        assert!(result.is_none(), "answer {:?}", answer);
        assert_eq!(provider.create_calls(), 0, "answer {:?}", answer);
    }
}

#[tokio::test]
async fn test_run_connect_bills_only() {
    let provider = MockProvider::new()
        .with_statuses(vec![CustomerStatus::ready()])
        .with_bills(serde_json::from_value(sample_bills()).unwrap());
    let workflow = mock_workflow(provider.clone());

    let mut input = Cursor::new("\n\n");
    let result = commands::run_connect(
        &workflow,
        &mut input,
        "pge",
        "a@b.c",
        true,
        &PollInterrupt::new(),
    )
    .await
    .unwrap();

    assert!(result.is_none());
    assert_eq!(provider.bills_calls(), 1);
}
