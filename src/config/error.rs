//! Errors raised while loading or checking `AppConfig`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
}

/// A single rejected setting. The payload names the offending key.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingRequired(&'static str),

    #[error("database.url must be a postgres:// or postgresql:// URL")]
    InvalidDatabaseUrl,

    #[error("database pool needs 0 < min_connections <= max_connections")]
    InvalidPoolSize,

    #[error("database.max_connections is capped at 100")]
    PoolSizeTooLarge,

    #[error("payment.stripe_api_key must start with sk_")]
    InvalidStripeKey,

    #[error("payment.stripe_webhook_secret must start with whsec_")]
    InvalidStripeWebhookSecret,

    #[error("provider timeout and webhook tolerance must be positive (timeout at most 120s)")]
    InvalidTimeout,

    #[error("plan prices must be positive")]
    InvalidPlanPrice,

    #[error("payment.currency must be a three-letter ISO code")]
    InvalidCurrency,

    #[error("{0} is not an absolute http(s) URL")]
    InvalidUrl(&'static str),

    #[error("registration.success_url must carry the {{CHECKOUT_SESSION_ID}} placeholder")]
    MissingSessionPlaceholder,

    #[error("invalid registration window: {0}")]
    InvalidWindow(&'static str),
}
