//! Payment provider port.
//!
//! The narrow surface the engine needs from a hosted-checkout payment
//! processor (Stripe in production): create and inspect checkout sessions,
//! stop or resume a subscription, and turn a signed webhook delivery into a
//! verified [`ProviderEvent`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::webhook::{ProviderEvent, WebhookError};

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a hosted checkout session.
    ///
    /// `metadata` is returned untouched on the session and on the
    /// `checkout.session.completed` event.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Fetches the current state of a checkout session. Idempotent.
    async fn retrieve_session(&self, session_id: &str)
        -> Result<CheckoutSessionDetails, PaymentError>;

    /// Cancels a provider subscription, now or at the end of the period.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), PaymentError>;

    /// Withdraws a pending cancel-at-period-end.
    async fn reactivate_subscription(&self, subscription_id: &str) -> Result<(), PaymentError>;

    /// Verifies the signature over the raw body and decodes the event.
    ///
    /// # Errors
    ///
    /// Signature and envelope failures as [`WebhookError`]. Payloads of
    /// known event types that fail to decode are not errors; they come back
    /// as `ProviderEventKind::Malformed`.
    fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<ProviderEvent, WebhookError>;
}

/// Billing mode of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// One-off charge.
    Payment,
    /// Recurring billing.
    Subscription,
}

/// Recurring interval for a subscription line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    /// Cents per unit.
    pub unit_amount: i64,
    pub currency: String,
    pub quantity: u32,
    pub interval: Option<BillingInterval>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    pub mode: CheckoutMode,
    pub line_items: Vec<LineItem>,
    pub customer_email: Option<String>,
    /// Must contain the provider's session id placeholder.
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
    /// Provider-side idempotency key for safe retries of this request.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub expires_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutSessionStatus {
    Open,
    Complete,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionDetails {
    pub id: String,
    pub status: CheckoutSessionStatus,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub amount_total: Option<i64>,
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionDetails {
    pub fn is_paid(&self) -> bool {
        self.status == CheckoutSessionStatus::Complete
            && matches!(self.payment_status.as_str(), "paid" | "no_payment_required")
    }
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,
    /// Provider's own error code, if it sent one.
    pub provider_code: Option<String>,
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            PaymentErrorCode::Timeout,
            format!("{} timed out", operation),
        )
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidRequest, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    NetworkError,
    Timeout,
    RateLimitExceeded,
    AuthenticationError,
    InvalidRequest,
    NotFound,
    ProviderError,
}

impl PaymentErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::Timeout
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::Timeout => "timeout",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        f.write_str(s)
    }
}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        DomainError::new(ErrorCode::PaymentProviderError, err.message)
            .with_detail("payment_error_code", err.code.to_string())
    }
}
