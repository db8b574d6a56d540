//! Payment configuration

use serde::Deserialize;
use std::time::Duration;

use crate::domain::subscription::PlanPricing;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Stripe API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Upper bound on checkout creation and cancellation calls
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Accepted age of a webhook signature
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,

    #[serde(default = "default_monthly_price")]
    pub monthly_price_cents: i64,

    #[serde(default = "default_annual_price")]
    pub annual_price_cents: i64,

    #[serde(default = "default_currency")]
    pub currency: String,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn plan_pricing(&self) -> PlanPricing {
        PlanPricing::new(self.monthly_price_cents, self.annual_price_cents)
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("payment.stripe_api_key"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("payment.stripe_webhook_secret"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://") {
            return Err(ValidationError::InvalidUrl("payment.api_base_url"));
        }
        if self.provider_timeout_secs == 0 || self.provider_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.webhook_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.monthly_price_cents <= 0 || self.annual_price_cents <= 0 {
            return Err(ValidationError::InvalidPlanPrice);
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency);
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            api_base_url: default_api_base_url(),
            provider_timeout_secs: default_provider_timeout(),
            webhook_tolerance_secs: default_webhook_tolerance(),
            monthly_price_cents: default_monthly_price(),
            annual_price_cents: default_annual_price(),
            currency: default_currency(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_webhook_tolerance() -> i64 {
    300
}

fn default_monthly_price() -> i64 {
    PlanPricing::DEFAULT_MONTHLY_CENTS
}

fn default_annual_price() -> i64 {
    PlanPricing::DEFAULT_ANNUAL_CENTS
}

fn default_currency() -> String {
    "usd".to_string()
}
