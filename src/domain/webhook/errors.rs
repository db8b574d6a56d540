//! Webhook processing errors and outcomes.
//!
//! Every verified delivery ends in a [`WebhookOutcome`] and is acknowledged.
//! Only a [`WebhookError`] makes the provider redeliver, and only the
//! retryable ones should.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCategory};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed more than five minutes ago.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Signature header or envelope could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Storage failed mid-processing; redelivery converges.
    #[error("Storage error: {0}")]
    Infrastructure(String),
}

impl WebhookError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Infrastructure(_))
    }

    pub fn is_signature_failure(&self) -> bool {
        !self.is_retryable()
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            WebhookError::Infrastructure(_) => ErrorCategory::Internal,
            _ => ErrorCategory::Validation,
        }
    }

    /// Status for the transport layer: 4xx stops redelivery, 5xx asks for it.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => 401,
            WebhookError::InvalidTimestamp | WebhookError::ParseError(_) => 400,
            WebhookError::Infrastructure(_) => 500,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Infrastructure(err.to_string())
    }
}

/// How a verified event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        /// Payment landed but the promo ledger rejected the redemption.
        /// Needs a manual grant.
        promo_redemption_failed: bool,
    },
    /// Natural keys show this event was already applied.
    Duplicate,
    /// Older than the last provider state applied to the subscription.
    Stale,
    /// Undecodable or referring to records that do not exist. Never retried.
    Dropped { reason: String },
    /// No handler for this event type.
    Ignored,
}

impl WebhookOutcome {
    pub fn applied() -> Self {
        WebhookOutcome::Applied {
            promo_redemption_failed: false,
        }
    }

    pub fn dropped(reason: impl Into<String>) -> Self {
        WebhookOutcome::Dropped {
            reason: reason.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied { .. } => "applied",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Stale => "stale",
            WebhookOutcome::Dropped { .. } => "dropped",
            WebhookOutcome::Ignored => "ignored",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_infrastructure_is_retryable() {
        assert!(WebhookError::Infrastructure("db".into()).is_retryable());
        assert!(!WebhookError::InvalidSignature.is_retryable());
        assert!(!WebhookError::ParseError("x".into()).is_retryable());
    }

    #[test]
    fn status_codes_drive_redelivery() {
        assert_eq!(WebhookError::InvalidSignature.status_code(), 401);
        assert_eq!(WebhookError::TimestampOutOfRange.status_code(), 401);
        assert_eq!(WebhookError::ParseError("x".into()).status_code(), 400);
        assert_eq!(WebhookError::Infrastructure("x".into()).status_code(), 500);
    }

    #[test]
    fn domain_errors_are_retryable_infrastructure() {
        let err: WebhookError = DomainError::database("connection lost").into();
        assert!(err.is_retryable());
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(WebhookOutcome::applied().label(), "applied");
        assert_eq!(WebhookOutcome::dropped("gone").label(), "dropped");
    }
}
