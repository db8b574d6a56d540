//! Application configuration module
//!
//! Configuration is loaded from environment variables with the
//! `ENTITLEMENTS` prefix; nested values use `__` as separator.
//!
//! # Example
//!
//! ```no_run
//! use entitlement_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod payment;
mod registration;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use registration::{RegistrationConfig, SESSION_ID_PLACEHOLDER};

use serde::Deserialize;

pub const ENV_PREFIX: &str = "ENTITLEMENTS";

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Payment provider, plan prices and currency
    pub payment: PaymentConfig,

    /// Pending registration windows and checkout redirects
    pub registration: RegistrationConfig,

    /// PostgreSQL; in-memory stores are used when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `ENTITLEMENTS__*` variables:
    ///
    /// - `ENTITLEMENTS__PAYMENT__STRIPE_API_KEY=...` -> `payment.stripe_api_key`
    /// - `ENTITLEMENTS__REGISTRATION__SUCCESS_URL=...` -> `registration.success_url`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load and validate in one step.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first invalid section's `ValidationError`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.payment.validate()?;
        self.registration.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[(&str, &str)] = &[
        ("ENTITLEMENTS__PAYMENT__STRIPE_API_KEY", "sk_test_xxx"),
        ("ENTITLEMENTS__PAYMENT__STRIPE_WEBHOOK_SECRET", "whsec_xxx"),
        ("ENTITLEMENTS__REGISTRATION__SUCCESS_URL", "https://app.example.com/welcome"),
        ("ENTITLEMENTS__REGISTRATION__CANCEL_URL", "https://app.example.com/pricing"),
    ];

    fn set_minimal_env() {
        for (k, v) in VARS {
            env::set_var(k, v);
        }
    }

    fn clear_env() {
        for (k, _) in VARS {
            env::remove_var(k);
        }
        env::remove_var("ENTITLEMENTS__PAYMENT__MONTHLY_PRICE_CENTS");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ENTITLEMENTS__PAYMENT__MONTHLY_PRICE_CENTS", "4500");
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.payment.stripe_api_key, "sk_test_xxx");
        assert_eq!(config.payment.monthly_price_cents, 4500);
        assert_eq!(config.registration.pending_ttl_hours, 24);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load_validated();
        clear_env();

        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_missing_payment_section_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }
}
