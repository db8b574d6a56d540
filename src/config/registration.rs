//! Registration and checkout redirect configuration

use serde::Deserialize;

use crate::domain::registration::RegistrationWindows;

use super::error::ValidationError;

/// Placeholder the provider replaces with the checkout session id.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Where the provider sends the user after paying. The session id
    /// placeholder is appended if missing.
    pub success_url: String,

    /// Where the provider sends the user on abandon
    pub cancel_url: String,

    #[serde(default = "default_pending_ttl_hours")]
    pub pending_ttl_hours: i64,

    #[serde(default = "default_checkout_stale_minutes")]
    pub checkout_stale_minutes: i64,
}

impl RegistrationConfig {
    pub fn windows(&self) -> RegistrationWindows {
        RegistrationWindows {
            pending_ttl_hours: self.pending_ttl_hours,
            checkout_stale_minutes: self.checkout_stale_minutes,
        }
    }

    /// Success URL carrying the session id placeholder.
    pub fn success_url_with_session(&self) -> String {
        if self.success_url.contains(SESSION_ID_PLACEHOLDER) {
            return self.success_url.clone();
        }
        let separator = if self.success_url.contains('?') { '&' } else { '?' };
        format!("{}{}session_id={}", self.success_url, separator, SESSION_ID_PLACEHOLDER)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.success_url.is_empty() {
            return Err(ValidationError::MissingRequired("registration.success_url"));
        }
        if self.cancel_url.is_empty() {
            return Err(ValidationError::MissingRequired("registration.cancel_url"));
        }
        if !is_http_url(&self.success_url) {
            return Err(ValidationError::InvalidUrl("registration.success_url"));
        }
        if !is_http_url(&self.cancel_url) {
            return Err(ValidationError::InvalidUrl("registration.cancel_url"));
        }
        if self.pending_ttl_hours <= 0 {
            return Err(ValidationError::InvalidWindow("pending_ttl_hours"));
        }
        if self.checkout_stale_minutes <= 0
            || self.checkout_stale_minutes >= self.pending_ttl_hours * 60
        {
            return Err(ValidationError::InvalidWindow("checkout_stale_minutes"));
        }
        Ok(())
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            success_url: String::new(),
            cancel_url: String::new(),
            pending_ttl_hours: default_pending_ttl_hours(),
            checkout_stale_minutes: default_checkout_stale_minutes(),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn default_pending_ttl_hours() -> i64 {
    24
}

fn default_checkout_stale_minutes() -> i64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RegistrationConfig {
        RegistrationConfig {
            success_url: "https://app.example.com/welcome".to_string(),
            cancel_url: "https://app.example.com/pricing".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn default_windows_match_domain_defaults() {
        assert_eq!(valid().windows(), RegistrationWindows::default());
    }

    #[test]
    fn appends_session_placeholder() {
        assert_eq!(
            valid().success_url_with_session(),
            "https://app.example.com/welcome?session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[test]
    fn appends_placeholder_to_existing_query() {
        let config = RegistrationConfig {
            success_url: "https://app.example.com/welcome?from=signup".to_string(),
            ..valid()
        };
        assert_eq!(
            config.success_url_with_session(),
            "https://app.example.com/welcome?from=signup&session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[test]
    fn keeps_explicit_placeholder() {
        let config = RegistrationConfig {
            success_url: "https://app.example.com/done/{CHECKOUT_SESSION_ID}".to_string(),
            ..valid()
        };
        assert_eq!(config.success_url_with_session(), config.success_url);
    }

    #[test]
    fn rejects_stale_window_longer_than_ttl() {
        let config = RegistrationConfig {
            pending_ttl_hours: 1,
            checkout_stale_minutes: 90,
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidWindow("checkout_stale_minutes"))
        );
    }

    #[test]
    fn requires_redirect_urls() {
        assert!(RegistrationConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }
}
