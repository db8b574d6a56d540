//! Mock payment provider for testing.
//!
//! Provides a configurable implementation of `PaymentProvider` for unit and
//! integration tests. Supports:
//! - Checkout sessions that can later be completed or expired
//! - Error injection per method
//! - Artificial latency for timeout tests
//! - Call tracking
//! - Webhook verification with a real or absent secret

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::domain::foundation::Timestamp;
use crate::domain::webhook::{ProviderEvent, WebhookError, WebhookVerifier};
use crate::ports::{
    CheckoutSession, CheckoutSessionDetails, CheckoutSessionStatus, CreateCheckoutRequest,
    PaymentError, PaymentProvider,
};

use super::webhook_types::parse_event;

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.set_method_error("cancel_subscription", PaymentError::network("reset"));
///
/// let session = mock.create_checkout_session(request).await?;
/// mock.complete_session(&session.id, "paid");
/// ```
#[derive(Default)]
pub struct MockPaymentProvider {
    /// Inner state (thread-safe for async tests).
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Sessions created through this mock, by id.
    sessions: HashMap<String, CheckoutSessionDetails>,

    /// Requests passed to `create_checkout_session`, oldest first.
    checkout_requests: Vec<CreateCheckoutRequest>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    /// Sleep before answering any call.
    delay: Option<Duration>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,

    webhook_verify_mode: WebhookVerifyMode,

    session_counter: u64,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

/// How to handle webhook verification.
#[derive(Default, Clone)]
enum WebhookVerifyMode {
    /// Skip the signature and parse the payload.
    #[default]
    AcceptAll,

    /// Verify against a signing secret, as production does.
    RequireSignature(String),

    /// Always fail verification.
    AlwaysFail,
}

impl MockPaymentProvider {
    /// Create a new mock provider with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that verifies webhook signatures with `secret`.
    pub fn with_webhook_secret(secret: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode = WebhookVerifyMode::RequireSignature(secret.into());
        mock
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode = WebhookVerifyMode::AlwaysFail;
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    /// Delay every call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// Store or replace a session returned by `retrieve_session`.
    pub fn set_session_details(&self, details: CheckoutSessionDetails) {
        self.state().sessions.insert(details.id.clone(), details);
    }

    /// Mark a session as completed with the given payment status.
    pub fn complete_session(&self, session_id: &str, payment_status: &str) {
        if let Some(session) = self.state().sessions.get_mut(session_id) {
            session.status = CheckoutSessionStatus::Complete;
            session.payment_status = payment_status.to_string();
            session.customer_id = Some(format!("cus_mock_{}", session_id));
            session.subscription_id = Some(format!("sub_mock_{}", session_id));
        }
    }

    /// Mark a session as expired.
    pub fn expire_session(&self, session_id: &str) {
        if let Some(session) = self.state().sessions.get_mut(session_id) {
            session.status = CheckoutSessionStatus::Expired;
        }
    }

    pub fn session(&self, session_id: &str) -> Option<CheckoutSessionDetails> {
        self.state().sessions.get(session_id).cloned()
    }

    /// The most recent checkout request.
    pub fn last_checkout_request(&self) -> Option<CreateCheckoutRequest> {
        self.state().checkout_requests.last().cloned()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    /// Records the call, applies the delay, then returns any injected error.
    async fn enter(&self, method: &str, args: Vec<String>) -> Result<(), PaymentError> {
        let delay = {
            let mut state = self.state();
            state.call_log.push(MethodCall {
                method: method.to_string(),
                args,
            });
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.state().method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Clone for MockPaymentProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let amount: i64 = request
            .line_items
            .iter()
            .map(|item| item.unit_amount * i64::from(item.quantity))
            .sum();
        self.enter(
            "create_checkout_session",
            vec![
                request.customer_email.clone().unwrap_or_default(),
                amount.to_string(),
            ],
        )
        .await?;

        let mut state = self.state();
        state.session_counter += 1;
        let id = format!("cs_mock_{}", state.session_counter);

        state.sessions.insert(
            id.clone(),
            CheckoutSessionDetails {
                id: id.clone(),
                status: CheckoutSessionStatus::Open,
                payment_status: "unpaid".to_string(),
                customer_id: None,
                subscription_id: None,
                amount_total: Some(amount),
                metadata: request.metadata.clone(),
            },
        );
        state.checkout_requests.push(request);

        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.com/c/pay/{}", id),
            id,
            expires_at: Some(Timestamp::now().add_hours(24)),
        })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, PaymentError> {
        self.enter("retrieve_session", vec![session_id.to_string()])
            .await?;

        self.state()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("Checkout session"))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), PaymentError> {
        self.enter(
            "cancel_subscription",
            vec![subscription_id.to_string(), at_period_end.to_string()],
        )
        .await
    }

    async fn reactivate_subscription(&self, subscription_id: &str) -> Result<(), PaymentError> {
        self.enter("reactivate_subscription", vec![subscription_id.to_string()])
            .await
    }

    fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<ProviderEvent, WebhookError> {
        let mode = {
            let mut state = self.state();
            state.call_log.push(MethodCall {
                method: "construct_webhook_event".to_string(),
                args: vec![signature.to_string()],
            });
            state.webhook_verify_mode.clone()
        };

        match mode {
            WebhookVerifyMode::AcceptAll => {}
            WebhookVerifyMode::RequireSignature(secret) => {
                WebhookVerifier::new(SecretString::new(secret)).verify(
                    payload,
                    signature,
                    Timestamp::now(),
                )?;
            }
            WebhookVerifyMode::AlwaysFail => return Err(WebhookError::InvalidSignature),
        }

        parse_event(payload)
    }
}
