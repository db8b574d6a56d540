//! Registration and checkout error types.

use thiserror::Error;

use crate::domain::foundation::{
    DomainError, ErrorCategory, ErrorCode, PendingRegistrationId, UserId, ValidationError,
};
use crate::domain::promo::PromoCodeError;
use crate::domain::subscription::Plan;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Email {0} is already in use")]
    EmailInUse(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Promo(#[from] PromoCodeError),

    #[error("Pending registration not found: {0}")]
    PendingRegistrationNotFound(PendingRegistrationId),

    #[error("Pending registration {0} has expired")]
    RegistrationExpired(PendingRegistrationId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("The {0} plan cannot be purchased")]
    PlanNotPurchasable(Plan),

    #[error("Zero-priced purchases complete without checkout")]
    ZeroPriceRequiresDirectPath,

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Registration storage error: {0}")]
    Infrastructure(String),
}

impl RegistrationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RegistrationError::EmailInUse(_) => ErrorCategory::Conflict,
            RegistrationError::Validation(_)
            | RegistrationError::PlanNotPurchasable(_)
            | RegistrationError::ZeroPriceRequiresDirectPath => ErrorCategory::Validation,
            RegistrationError::Promo(e) => e.category(),
            RegistrationError::PendingRegistrationNotFound(_)
            | RegistrationError::UserNotFound(_) => ErrorCategory::NotFound,
            RegistrationError::RegistrationExpired(_) => ErrorCategory::NotAvailable,
            RegistrationError::Provider(_) => ErrorCategory::ExternalProvider,
            RegistrationError::Infrastructure(_) => ErrorCategory::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.category().http_status()
    }
}

impl From<DomainError> for RegistrationError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::EmailInUse => RegistrationError::EmailInUse(
                err.details.get("email").cloned().unwrap_or(err.message),
            ),
            ErrorCode::PaymentProviderError => RegistrationError::Provider(err.message),
            _ => RegistrationError::Infrastructure(err.to_string()),
        }
    }
}
