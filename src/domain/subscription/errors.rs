//! Subscription lifecycle error types.

use thiserror::Error;

use crate::domain::foundation::{
    DomainError, ErrorCategory, ErrorCode, SubscriptionId, UserId, ValidationError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("Subscription not found: {0}")]
    NotFound(SubscriptionId),

    #[error("No subscription found for user: {0}")]
    NotFoundForUser(UserId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Subscription {0} is a local grant with no provider subscription to reactivate")]
    CannotReactivateLocalGrant(SubscriptionId),

    #[error("Invalid plan change: {0}")]
    InvalidPlanChange(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Subscription was modified concurrently: {0}")]
    ConcurrentModification(String),

    #[error("Subscription storage error: {0}")]
    Infrastructure(String),
}

impl SubscriptionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SubscriptionError::NotFound(_)
            | SubscriptionError::NotFoundForUser(_)
            | SubscriptionError::UserNotFound(_) => ErrorCategory::NotFound,
            SubscriptionError::CannotReactivateLocalGrant(_)
            | SubscriptionError::InvalidPlanChange(_)
            | SubscriptionError::Validation(_) => ErrorCategory::Validation,
            SubscriptionError::ConcurrentModification(_) => ErrorCategory::Conflict,
            SubscriptionError::Infrastructure(_) => ErrorCategory::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.category().http_status()
    }
}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ConcurrentModification => SubscriptionError::ConcurrentModification(err.message),
            _ => SubscriptionError::Infrastructure(err.to_string()),
        }
    }
}
