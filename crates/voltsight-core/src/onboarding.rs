//! Customer onboarding state machine
//!
//! ```text
//! NotStarted ─start─> Created ─confirm─> AwaitingCredentials ─> PollingBillReadiness ─> BillsReady
//!     │                  ^                      │ (pending)
//!     └─skip─> Skipped   └──────────────────────┘
//! ```
//!
//! Transitions are the only way to mutate a session. A provider failure leaves
//! the session in the state it held before the failing call.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::OnboardingError;
use crate::provider::{BillRecord, CustomerSession, UtilityProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Created,
    AwaitingCredentials,
    PollingBillReadiness,
    BillsReady,
    Skipped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not started",
            SessionState::Created => "created",
            SessionState::AwaitingCredentials => "awaiting credentials",
            SessionState::PollingBillReadiness => "polling bill readiness",
            SessionState::BillsReady => "bills ready",
            SessionState::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::BillsReady | SessionState::Skipped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of asking the provider whether credentials were entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    /// Credentials are on file; bill polling can begin
    Confirmed,
    /// Not yet; the customer should finish the onboarding form and retry
    Pending,
}

/// Pacing for bill-readiness polling
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Pause after the first unsuccessful check
    pub interval: Duration,
    /// Multiplier applied to the pause after each check
    pub backoff_factor: f64,
    /// Upper bound on a single pause
    pub max_interval: Duration,
    /// Total time before giving up
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            backoff_factor: 1.5,
            max_interval: Duration::from_secs(30),
            max_wait: Duration::from_secs(600),
        }
    }
}

impl PollPolicy {
    /// Constant pause with a total limit
    pub fn fixed(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval,
            backoff_factor: 1.0,
            max_interval: interval,
            max_wait,
        }
    }

    /// Reject pacing that would poll without pausing
    pub fn validate(&self) -> Result<(), OnboardingError> {
        if self.interval.is_zero() {
            return Err(OnboardingError::InvalidPolicy("interval must be non-zero"));
        }
        if self.max_interval.is_zero() {
            return Err(OnboardingError::InvalidPolicy("max interval must be non-zero"));
        }
        Ok(())
    }

    /// Pause to use after `current`
    pub fn next_interval(&self, current: Duration) -> Duration {
        let factor = if self.backoff_factor.is_finite() && self.backoff_factor >= 1.0 {
            self.backoff_factor
        } else {
            1.0
        };
        Duration::try_from_secs_f64(current.as_secs_f64() * factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// One customer's progress from account creation to downloaded bills
#[derive(Debug, Clone)]
pub struct OnboardingSession {
    state: SessionState,
    customer: Option<CustomerSession>,
    bills: Vec<BillRecord>,
}

impl Default for OnboardingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::NotStarted,
            customer: None,
            bills: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn customer(&self) -> Option<&CustomerSession> {
        self.customer.as_ref()
    }

    pub fn onboarding_link(&self) -> Option<&str> {
        self.customer.as_ref()?.onboarding_link.as_deref()
    }

    /// Downloaded bills, once the session reached `BillsReady`
    pub fn bills(&self) -> Option<&[BillRecord]> {
        (self.state == SessionState::BillsReady).then_some(self.bills.as_slice())
    }

    fn expect_state(
        &self,
        expected: SessionState,
        operation: &'static str,
    ) -> Result<(), OnboardingError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(OnboardingError::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }

    fn customer_id(&self) -> &str {
        self.customer.as_ref().map(|c| c.id.as_str()).unwrap_or_default()
    }

    /// Create the provider customer and capture its onboarding link
    pub async fn start<P>(
        &mut self,
        provider: &P,
        utility: &str,
        email: &str,
    ) -> Result<&CustomerSession, OnboardingError>
    where
        P: UtilityProvider + ?Sized,
    {
        self.expect_state(SessionState::NotStarted, "start")?;

        let customer = provider.create_customer(utility, email).await?;
        if customer.onboarding_link.is_none() {
            // the remote account exists; keep it so it can be reconciled
            warn!("Customer {} was created without an onboarding link", customer.id);
            let customer_id = customer.id.clone();
            self.customer = Some(customer);
            return Err(OnboardingError::MissingOnboardingLink { customer_id });
        }

        info!("Created customer {} for {}", customer.id, utility);
        self.state = SessionState::Created;
        Ok(self.customer.insert(customer))
    }

    /// Decline onboarding; no provider data is retrieved
    pub fn skip(&mut self) -> Result<(), OnboardingError> {
        self.expect_state(SessionState::NotStarted, "skip")?;
        info!("Onboarding skipped");
        self.state = SessionState::Skipped;
        Ok(())
    }

    /// Ask the provider whether the customer has entered credentials
    pub async fn confirm_credentials<P>(
        &mut self,
        provider: &P,
    ) -> Result<CredentialCheck, OnboardingError>
    where
        P: UtilityProvider + ?Sized,
    {
        self.expect_state(SessionState::Created, "confirm credentials")?;
        self.state = SessionState::AwaitingCredentials;

        let result = provider.fetch_status(self.customer_id()).await;
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                self.state = SessionState::Created;
                return Err(e.into());
            }
        };

        if let Some(customer) = self.customer.as_mut() {
            customer.apply_status(&status);
        }

        if status.has_filled_credentials {
            info!("Credentials confirmed for customer {}", self.customer_id());
            self.state = SessionState::PollingBillReadiness;
            Ok(CredentialCheck::Confirmed)
        } else {
            warn!(
                "Customer {} has not filled credentials yet",
                self.customer_id()
            );
            self.state = SessionState::Created;
            Ok(CredentialCheck::Pending)
        }
    }

    /// Poll until bills are ready, then download them once
    ///
    /// Fails with `InvalidPolicy` before any request if `policy` has a zero
    /// pause. Fails with `PollTimeout` once `policy.max_wait` elapses and with
    /// `Cancelled` as soon as `cancel` fires. Either way the session stays in
    /// `PollingBillReadiness` and may be polled again.
    pub async fn await_bills<P>(
        &mut self,
        provider: &P,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<&[BillRecord], OnboardingError>
    where
        P: UtilityProvider + ?Sized,
    {
        self.expect_state(SessionState::PollingBillReadiness, "await bills")?;
        policy.validate()?;

        let started = Instant::now();
        let deadline = started + policy.max_wait;
        let mut interval = policy.interval.min(policy.max_interval);
        let mut checks = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(OnboardingError::Cancelled { checks });
            }

            let status = provider.fetch_status(self.customer_id()).await?;
            checks += 1;
            if let Some(customer) = self.customer.as_mut() {
                customer.apply_status(&status);
            }

            if status.bills_are_ready {
                info!("Bills ready after {} status checks", checks);
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(OnboardingError::PollTimeout {
                    checks,
                    waited: now - started,
                });
            }

            let pause = interval.min(deadline - now);
            debug!("Bills not ready (check {}), waiting {:?}", checks, pause);
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(OnboardingError::Cancelled { checks });
                }
                _ = tokio::time::sleep(pause) => {}
            }
            interval = policy.next_interval(interval);
        }

        let bills = provider.fetch_bills(self.customer_id()).await?;
        info!("Retrieved {} bills", bills.len());

        self.bills = bills;
        self.state = SessionState::BillsReady;
        Ok(&self.bills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderOperation;
    use crate::provider::{CustomerStatus, MockProvider, MOCK_CUSTOMER_ID};

    fn quick_policy() -> PollPolicy {
        PollPolicy::fixed(Duration::from_millis(1), Duration::from_secs(5))
    }

    async fn polling_session(provider: &MockProvider) -> OnboardingSession {
        let mut session = OnboardingSession::new();
        session.start(provider, "pge", "a@b.c").await.unwrap();
        assert_eq!(
            session.confirm_credentials(provider).await.unwrap(),
            CredentialCheck::Confirmed
        );
        session
    }

    #[test]
    fn test_next_interval_backs_off_to_cap() {
        let policy = PollPolicy::default();
        let second = policy.next_interval(policy.interval);
        assert_eq!(second, Duration::from_millis(7500));

        let mut interval = policy.interval;
        for _ in 0..20 {
            interval = policy.next_interval(interval);
        }
        assert_eq!(interval, Duration::from_secs(30));

        let shrinking = PollPolicy {
            backoff_factor: 0.1,
            ..PollPolicy::default()
        };
        assert_eq!(
            shrinking.next_interval(Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_validate_rejects_zero_pauses() {
        assert!(PollPolicy::default().validate().is_ok());

        let zero = PollPolicy::fixed(Duration::ZERO, Duration::from_secs(1));
        assert!(matches!(
            zero.validate(),
            Err(OnboardingError::InvalidPolicy(_))
        ));

        let no_cap = PollPolicy {
            max_interval: Duration::ZERO,
            ..PollPolicy::default()
        };
        assert!(no_cap.validate().is_err());
    }

    #[tokio::test]
    async fn test_zero_interval_polls_nothing() {
        let provider = MockProvider::new().with_statuses(vec![CustomerStatus::credentials_filled()]);
        let mut session = polling_session(&provider).await;
        let policy = PollPolicy::fixed(Duration::ZERO, Duration::from_secs(1));

        let err = session
            .await_bills(&provider, &policy, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::InvalidPolicy(_)));
        // only the credential check
        assert_eq!(provider.status_calls(), 1);
        assert_eq!(session.state(), SessionState::PollingBillReadiness);
    }

    #[tokio::test]
    async fn test_first_pause_respects_cap() {
        let provider = MockProvider::new().with_statuses(vec![CustomerStatus::credentials_filled()]);
        let mut session = polling_session(&provider).await;
        let policy = PollPolicy {
            interval: Duration::from_secs(60),
            backoff_factor: 1.0,
            max_interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(40),
        };

        let err = session
            .await_bills(&provider, &policy, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            OnboardingError::PollTimeout { checks, .. } => assert!(checks >= 2),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_captures_link() {
        let provider = MockProvider::new();
        let mut session = OnboardingSession::new();

        let customer = session.start(&provider, "pge", "a@b.c").await.unwrap();
        assert_eq!(customer.id, MOCK_CUSTOMER_ID);
        assert_eq!(session.state(), SessionState::Created);
        assert!(session.onboarding_link().unwrap().contains(MOCK_CUSTOMER_ID));
        assert!(session.bills().is_none());
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let provider = MockProvider::new();
        let mut session = OnboardingSession::new();
        session.start(&provider, "pge", "a@b.c").await.unwrap();

        let err = session.start(&provider, "pge", "a@b.c").await.unwrap_err();
        assert!(matches!(
            err,
            OnboardingError::InvalidTransition {
                operation: "start",
                state: SessionState::Created
            }
        ));
        assert_eq!(provider.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_start_stays_not_started() {
        let provider = MockProvider::new().failing(ProviderOperation::CreateCustomer, 500);
        let mut session = OnboardingSession::new();

        let err = session.start(&provider, "pge", "a@b.c").await.unwrap_err();
        match err {
            OnboardingError::Provider(e) => {
                assert_eq!(e.operation(), ProviderOperation::CreateCustomer)
            }
            other => panic!("expected provider error, got {:?}", other),
        }
        assert_eq!(session.state(), SessionState::NotStarted);
    }

    #[tokio::test]
    async fn test_missing_link_keeps_created_customer() {
        let provider = MockProvider::new().without_onboarding_link();
        let mut session = OnboardingSession::new();

        let err = session.start(&provider, "pge", "a@b.c").await.unwrap_err();
        assert!(matches!(
            &err,
            OnboardingError::MissingOnboardingLink { customer_id } if customer_id == MOCK_CUSTOMER_ID
        ));
        assert!(err.to_string().contains(MOCK_CUSTOMER_ID));
        assert_eq!(session.state(), SessionState::NotStarted);
        assert_eq!(session.customer().map(|c| c.id.as_str()), Some(MOCK_CUSTOMER_ID));
        assert!(session.onboarding_link().is_none());
    }

    #[test]
    fn test_skip() {
        let mut session = OnboardingSession::new();
        session.skip().unwrap();
        assert_eq!(session.state(), SessionState::Skipped);
        assert!(session.state().is_terminal());
        assert!(session.skip().is_err());
    }

    #[tokio::test]
    async fn test_skip_after_start_rejected() {
        let provider = MockProvider::new();
        let mut session = OnboardingSession::new();
        session.start(&provider, "pge", "a@b.c").await.unwrap();

        assert!(matches!(
            session.skip(),
            Err(OnboardingError::InvalidTransition { .. })
        ));
        assert_eq!(session.state(), SessionState::Created);
    }

    #[tokio::test]
    async fn test_pending_credentials_return_to_created() {
        let provider = MockProvider::new().with_statuses(vec![
            CustomerStatus::pending(),
            CustomerStatus::credentials_filled(),
        ]);
        let mut session = OnboardingSession::new();
        session.start(&provider, "pge", "a@b.c").await.unwrap();

        assert_eq!(
            session.confirm_credentials(&provider).await.unwrap(),
            CredentialCheck::Pending
        );
        assert_eq!(session.state(), SessionState::Created);

        assert_eq!(
            session.confirm_credentials(&provider).await.unwrap(),
            CredentialCheck::Confirmed
        );
        assert_eq!(session.state(), SessionState::PollingBillReadiness);
        assert!(session.customer().unwrap().has_filled_credentials);
    }

    #[tokio::test]
    async fn test_failed_credential_check_returns_to_created() {
        let provider = MockProvider::new().failing(ProviderOperation::FetchStatus, 503);
        let mut session = OnboardingSession::new();
        session.start(&provider, "pge", "a@b.c").await.unwrap();

        assert!(session.confirm_credentials(&provider).await.is_err());
        assert_eq!(session.state(), SessionState::Created);
    }

    #[tokio::test]
    async fn test_confirm_before_start_rejected() {
        let provider = MockProvider::new();
        let mut session = OnboardingSession::new();
        assert!(matches!(
            session.confirm_credentials(&provider).await,
            Err(OnboardingError::InvalidTransition { .. })
        ));
        assert_eq!(provider.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_bills_ready_after_third_check() {
        let provider = MockProvider::new()
            .with_statuses(vec![
                CustomerStatus::credentials_filled(),
                CustomerStatus::credentials_filled(),
                CustomerStatus::credentials_filled(),
                CustomerStatus::ready(),
            ])
            .with_bills(vec![BillRecord::default(), BillRecord::default()]);
        let mut session = polling_session(&provider).await;

        let bills = session
            .await_bills(&provider, &quick_policy(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bills.len(), 2);
        assert_eq!(session.state(), SessionState::BillsReady);
        assert_eq!(session.bills().map(|b| b.len()), Some(2));

        // one credential check plus three readiness checks
        assert_eq!(provider.status_calls(), 4);
        assert_eq!(provider.bills_calls(), 1);
    }

    #[tokio::test]
    async fn test_poll_timeout() {
        let provider = MockProvider::new().with_statuses(vec![CustomerStatus::credentials_filled()]);
        let mut session = polling_session(&provider).await;
        let policy = PollPolicy::fixed(Duration::from_millis(5), Duration::from_millis(30));

        let err = session
            .await_bills(&provider, &policy, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            OnboardingError::PollTimeout { checks, waited } => {
                assert!(checks >= 2);
                assert!(waited >= Duration::from_millis(30));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(session.state(), SessionState::PollingBillReadiness);
        assert_eq!(provider.bills_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_polling() {
        let provider = MockProvider::new().with_statuses(vec![CustomerStatus::credentials_filled()]);
        let mut session = polling_session(&provider).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = session
            .await_bills(&provider, &quick_policy(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::Cancelled { checks: 0 }));
        assert_eq!(provider.bills_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting() {
        let provider = MockProvider::new().with_statuses(vec![CustomerStatus::credentials_filled()]);
        let mut session = polling_session(&provider).await;
        let policy = PollPolicy::fixed(Duration::from_secs(60), Duration::from_secs(600));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = session
            .await_bills(&provider, &policy, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::Cancelled { checks: 1 }));
        assert_eq!(session.state(), SessionState::PollingBillReadiness);
        assert_eq!(provider.bills_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_bill_download_can_resume() {
        let provider = MockProvider::new()
            .with_statuses(vec![CustomerStatus::credentials_filled(), CustomerStatus::ready()])
            .failing(ProviderOperation::FetchBills, 502);
        let mut session = polling_session(&provider).await;

        let err = session
            .await_bills(&provider, &quick_policy(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::Provider(_)));
        assert_eq!(session.state(), SessionState::PollingBillReadiness);
    }
}
