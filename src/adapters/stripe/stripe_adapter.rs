//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST API:
//! hosted checkout sessions, session lookup, subscription cancel and resume,
//! and webhook verification.
//!
//! # Security
//!
//! - Webhook signatures are checked by [`WebhookVerifier`] (HMAC-SHA256,
//!   constant-time comparison, timestamp tolerance)
//! - Secrets are held as `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::from_payment_config(&app_config.payment);
//! let adapter = StripePaymentAdapter::new(config)?;
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::PaymentConfig;
use crate::domain::foundation::Timestamp;
use crate::domain::webhook::{ProviderEvent, WebhookError, WebhookVerifier};
use crate::ports::{
    CheckoutSession, CheckoutSessionDetails, CheckoutSessionStatus, CreateCheckoutRequest,
    PaymentError, PaymentErrorCode, PaymentProvider,
};

use super::webhook_types::{parse_event, StripeCheckoutSession};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Per-request HTTP timeout.
    request_timeout: Duration,

    /// Accepted webhook signature age in seconds.
    webhook_tolerance_secs: i64,

    /// Attempts for idempotent reads before giving up.
    retry_attempts: usize,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            webhook_tolerance_secs: crate::domain::webhook::DEFAULT_TOLERANCE_SECS,
            retry_attempts: 3,
        }
    }

    pub fn from_payment_config(config: &PaymentConfig) -> Self {
        Self::new(
            config.stripe_api_key.clone(),
            config.stripe_webhook_secret.clone(),
        )
        .with_base_url(config.api_base_url.clone())
        .with_request_timeout(config.provider_timeout())
        .with_webhook_tolerance(config.webhook_tolerance_secs)
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_webhook_tolerance(mut self, secs: i64) -> Self {
        self.webhook_tolerance_secs = secs;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }
}

/// Stripe error body: `{"error": {"message": ..., "code": ...}}`.
#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    verifier: WebhookVerifier,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PaymentError::provider(format!("HTTP client setup failed: {}", e)))?;
        let verifier = WebhookVerifier::new(config.webhook_secret.clone())
            .with_tolerance(config.webhook_tolerance_secs);

        Ok(Self {
            config,
            verifier,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url, path)
    }

    /// Sends a request and decodes the JSON body, mapping transport and
    /// API failures to `PaymentError`.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PaymentError> {
        let response = request
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PaymentError::timeout(operation)
                } else {
                    PaymentError::network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = map_api_error(status, &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                code = %err.code,
                error = %err.message,
                "Stripe API call failed"
            );
            return Err(err);
        }

        response.json::<T>().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }

    async fn fetch_session(&self, session_id: &str) -> Result<StripeCheckoutSession, PaymentError> {
        let url = self.url(&format!("checkout/sessions/{}", session_id));
        self.send("retrieve_session", self.http_client.get(&url)).await
    }
}

fn map_api_error(status: reqwest::StatusCode, body: &str) -> PaymentError {
    let detail = serde_json::from_str::<StripeErrorBody>(body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| format!("Stripe API error ({})", status));

    let code = match status.as_u16() {
        400 | 402 | 409 => PaymentErrorCode::InvalidRequest,
        401 | 403 => PaymentErrorCode::AuthenticationError,
        404 => PaymentErrorCode::NotFound,
        429 => PaymentErrorCode::RateLimitExceeded,
        _ => PaymentErrorCode::ProviderError,
    };

    let err = PaymentError::new(code, message);
    match detail.and_then(|d| d.code) {
        Some(provider_code) => err.with_provider_code(provider_code),
        None => err,
    }
}

/// Form fields for a hosted checkout session.
///
/// Metadata is written to the session and to the subscription it creates,
/// so subscription events can be matched back to the user.
fn checkout_form(request: &CreateCheckoutRequest) -> Vec<(String, String)> {
    let mode = match request.mode {
        crate::ports::CheckoutMode::Payment => "payment",
        crate::ports::CheckoutMode::Subscription => "subscription",
    };

    let mut params = vec![
        ("mode".to_string(), mode.to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    if let Some(email) = &request.customer_email {
        params.push(("customer_email".to_string(), email.clone()));
    }

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
        params.push((format!("{}[price_data][currency]", prefix), item.currency.clone()));
        params.push((
            format!("{}[price_data][unit_amount]", prefix),
            item.unit_amount.to_string(),
        ));
        params.push((
            format!("{}[price_data][product_data][name]", prefix),
            item.name.clone(),
        ));
        if let Some(interval) = item.interval {
            params.push((
                format!("{}[price_data][recurring][interval]", prefix),
                interval.as_str().to_string(),
            ));
        }
    }

    let mut metadata: Vec<_> = request.metadata.iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
        if request.mode == crate::ports::CheckoutMode::Subscription {
            params.push((format!("subscription_data[metadata][{}]", key), value.clone()));
        }
    }

    params
}

fn session_status(status: Option<&str>) -> CheckoutSessionStatus {
    match status {
        Some("complete") => CheckoutSessionStatus::Complete,
        Some("expired") => CheckoutSessionStatus::Expired,
        _ => CheckoutSessionStatus::Open,
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = self.url("checkout/sessions");
        let params = checkout_form(&request);

        let mut builder = self.http_client.post(&url).form(&params);
        if let Some(key) = &request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let session: StripeCheckoutSession = self.send("create_checkout_session", builder).await?;
        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::provider("Checkout session has no URL"))?;

        tracing::info!(session_id = %session.id, "Stripe checkout session created");

        Ok(CheckoutSession {
            id: session.id,
            url: checkout_url,
            expires_at: session.expires_at.and_then(Timestamp::from_unix_secs),
        })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, PaymentError> {
        let strategy = ExponentialBackoff::from_millis(50)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(self.config.retry_attempts.saturating_sub(1));

        let session = RetryIf::spawn(
            strategy,
            || self.fetch_session(session_id),
            |err: &PaymentError| {
                if err.retryable {
                    tracing::debug!(session_id, error = %err, "Retrying session lookup");
                }
                err.retryable
            },
        )
        .await?;

        Ok(CheckoutSessionDetails {
            status: session_status(session.status.as_deref()),
            id: session.id,
            payment_status: session.payment_status,
            customer_id: session.customer,
            subscription_id: session.subscription,
            amount_total: session.amount_total,
            metadata: session.metadata,
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), PaymentError> {
        let url = self.url(&format!("subscriptions/{}", subscription_id));

        let builder = if at_period_end {
            self.http_client
                .post(&url)
                .form(&[("cancel_at_period_end", "true")])
        } else {
            self.http_client.delete(&url)
        };

        let _: serde_json::Value = self.send("cancel_subscription", builder).await?;
        tracing::info!(subscription_id, at_period_end, "Stripe subscription cancelled");
        Ok(())
    }

    async fn reactivate_subscription(&self, subscription_id: &str) -> Result<(), PaymentError> {
        let url = self.url(&format!("subscriptions/{}", subscription_id));
        let builder = self
            .http_client
            .post(&url)
            .form(&[("cancel_at_period_end", "false")]);

        let _: serde_json::Value = self.send("reactivate_subscription", builder).await?;
        tracing::info!(subscription_id, "Stripe subscription reactivated");
        Ok(())
    }

    fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<ProviderEvent, WebhookError> {
        if let Err(e) = self.verifier.verify(payload, signature, Timestamp::now()) {
            tracing::warn!(error = %e, "Webhook signature rejected");
            return Err(e);
        }

        parse_event(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            e
        })
    }
}
