//! Test utilities for voltsight-core
//!
//! Local mock servers for the provider and prediction HTTP APIs, used by the
//! client tests and available to other crates through the `test-utils`
//! feature.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// API key the mock provider accepts
pub const MOCK_PROVIDER_KEY: &str = "test-provider-key";

/// Basic auth header for `MOCK_PROVIDER_KEY` with an empty password
const MOCK_PROVIDER_AUTH: &str = "Basic dGVzdC1wcm92aWRlci1rZXk6";

/// API key the mock prediction service accepts
pub const MOCK_PREDICTION_KEY: &str = "test-prediction-key";

type Shared<T> = Arc<Mutex<T>>;

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Bind a router on an ephemeral port and serve it until the sender fires
async fn spawn_server(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

fn json_response(status: StatusCode, body: impl Into<String>) -> Response {
    let body: String = body.into();
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

struct ProviderState {
    statuses: VecDeque<Value>,
    last_status: Value,
    bills: Value,
    created: Vec<Value>,
    bills_calls: usize,
    delay: Duration,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            statuses: VecDeque::new(),
            last_status: json!({"bills_are_ready": false, "has_filled_credentials": false}),
            bills: json!([]),
            created: Vec::new(),
            bills_calls: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Mock utility-data provider
///
/// Serves `/api/v2/customers`, `/api/v2/customers/:id` and
/// `/api/v2/customers/:id/bills` behind basic auth.
pub struct MockProviderServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    state: Shared<ProviderState>,
}

impl MockProviderServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state: Shared<ProviderState> = Arc::default();

        let app = Router::new()
            .route("/api/v2/customers", post(handle_create_customer))
            .route("/api/v2/customers/:id", get(handle_customer_status))
            .route("/api/v2/customers/:id/bills", get(handle_customer_bills))
            .with_state(state.clone());

        let (addr, shutdown_tx) = spawn_server(app).await;
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            state,
        }
    }

    /// Status bodies returned by successive status reads; the last one repeats
    pub fn with_statuses(self, statuses: Vec<Value>) -> Self {
        lock(&self.state).statuses = statuses.into();
        self
    }

    /// Body returned by the bills endpoint
    pub fn with_bills(self, bills: Value) -> Self {
        lock(&self.state).bills = bills;
        self
    }

    /// Delay every response
    pub fn with_delay(self, delay: Duration) -> Self {
        lock(&self.state).delay = delay;
        self
    }

    /// Base URL including the `/api/v2` prefix
    pub fn url(&self) -> String {
        format!("http://{}/api/v2", self.addr)
    }

    /// Request bodies received by `POST /customers`
    pub fn created_customers(&self) -> Vec<Value> {
        lock(&self.state).created.clone()
    }

    pub fn bills_calls(&self) -> usize {
        lock(&self.state).bills_calls
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockProviderServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn provider_gate(state: &Shared<ProviderState>, headers: &HeaderMap) -> Option<Response> {
    let delay = lock(state).delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(MOCK_PROVIDER_AUTH);
    if authorized {
        None
    } else {
        Some(json_response(
            StatusCode::UNAUTHORIZED,
            r#"{"error": "unauthorized"}"#,
        ))
    }
}

async fn handle_create_customer(
    State(state): State<Shared<ProviderState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejection) = provider_gate(&state, &headers).await {
        return rejection;
    }

    lock(&state).created.push(body);
    Json(json!({
        "id": 42,
        "onboarding_link": "https://onboard.mock.test/customers/42",
        "onboarding_token": "tok_42",
        "bills_are_ready": false,
        "has_filled_credentials": false
    }))
    .into_response()
}

async fn handle_customer_status(
    State(state): State<Shared<ProviderState>>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Response {
    if let Some(rejection) = provider_gate(&state, &headers).await {
        return rejection;
    }

    let mut state = lock(&state);
    if let Some(next) = state.statuses.pop_front() {
        state.last_status = next;
    }
    Json(state.last_status.clone()).into_response()
}

async fn handle_customer_bills(
    State(state): State<Shared<ProviderState>>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Response {
    if let Some(rejection) = provider_gate(&state, &headers).await {
        return rejection;
    }

    let mut state = lock(&state);
    state.bills_calls += 1;
    Json(state.bills.clone()).into_response()
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PredictionState {
    reply: Option<(u16, String)>,
    payloads: Vec<Value>,
    delay: Duration,
}

/// Mock prediction service
///
/// Serves `POST /calculate` and `GET /calculate/service-area` behind the
/// `X-API-Key` header. By default `/calculate` answers with twelve monthly
/// intervals for 2025 valued 100.0 through 1200.0.
pub struct MockPredictionServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    state: Shared<PredictionState>,
}

impl MockPredictionServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state: Shared<PredictionState> = Arc::default();

        let app = Router::new()
            .route("/calculate", post(handle_calculate))
            .route("/calculate/service-area", get(handle_service_area))
            .with_state(state.clone());

        let (addr, shutdown_tx) = spawn_server(app).await;
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            state,
        }
    }

    /// Replace the `/calculate` reply with a fixed status and raw body
    pub fn with_reply(self, status: u16, body: &str) -> Self {
        lock(&self.state).reply = Some((status, body.to_string()));
        self
    }

    /// Delay every response
    pub fn with_delay(self, delay: Duration) -> Self {
        lock(&self.state).delay = delay;
        self
    }

    /// Calculation endpoint URL
    pub fn url(&self) -> String {
        format!("http://{}/calculate", self.addr)
    }

    /// Payloads received by `/calculate`, in order
    pub fn received_payloads(&self) -> Vec<Value> {
        lock(&self.state).payloads.clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockPredictionServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn prediction_gate(
    state: &Shared<PredictionState>,
    headers: &HeaderMap,
) -> Option<Response> {
    let delay = lock(state).delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let authorized = headers.get("x-api-key").and_then(|v| v.to_str().ok())
        == Some(MOCK_PREDICTION_KEY);
    if authorized {
        None
    } else {
        Some(json_response(
            StatusCode::FORBIDDEN,
            r#"{"error": "invalid api key"}"#,
        ))
    }
}

fn monthly_intervals() -> Value {
    let intervals: Vec<Value> = (1..=12)
        .map(|month| {
            json!({
                "from_datetime": format!("2025-{:02}-01T00:00:00", month),
                "to_datetime": format!("2025-{:02}-28T00:00:00", month),
                "variable": "consumption.electricity",
                "value": month as f64 * 100.0
            })
        })
        .collect();
    json!({"data": {"intervals": intervals}})
}

async fn handle_calculate(
    State(state): State<Shared<PredictionState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    if let Some(rejection) = prediction_gate(&state, &headers).await {
        return rejection;
    }

    let mut state = lock(&state);
    state.payloads.push(payload);
    match &state.reply {
        Some((status, body)) => json_response(
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body.clone(),
        ),
        None => Json(monthly_intervals()).into_response(),
    }
}

async fn handle_service_area(
    State(state): State<Shared<PredictionState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = prediction_gate(&state, &headers).await {
        return rejection;
    }

    Json(json!({
        "lat": params.get("lat"),
        "lon": params.get("lon"),
        "postalCode": params.get("postalCode"),
        "serviced": true
    }))
    .into_response()
}
