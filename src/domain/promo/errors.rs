//! Promo code error types.
//!
//! # Category Mapping
//!
//! | Error | Category |
//! |-------|----------|
//! | InvalidFormat | Validation |
//! | InvalidPromoCode | NotAvailable |
//! | PlanNotApplicable | NotAvailable |
//! | Exhausted | NotAvailable |
//! | AlreadyUsedByUser | Conflict |
//! | DuplicateCode | Conflict |
//! | InvariantViolation | InvariantViolation |
//! | Infrastructure | Internal |

use std::fmt;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCategory, ErrorCode, UserId, ValidationError};
use crate::domain::subscription::Plan;

/// Why a code cannot be priced right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    NotFound,
    Inactive,
    NotYetValid,
    Expired,
    Exhausted,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnavailableReason::NotFound => "code does not exist",
            UnavailableReason::Inactive => "code is no longer active",
            UnavailableReason::NotYetValid => "code is not valid yet",
            UnavailableReason::Expired => "code has expired",
            UnavailableReason::Exhausted => "code has reached its usage limit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromoCodeError {
    #[error("Invalid promo code: {0}")]
    InvalidFormat(#[from] ValidationError),

    #[error("Promo code '{code}' is not available: {reason}")]
    InvalidPromoCode {
        code: String,
        reason: UnavailableReason,
    },

    #[error("Promo code '{code}' does not apply to the {plan} plan")]
    PlanNotApplicable { code: String, plan: Plan },

    #[error("Promo code '{code}' was already used by user {user_id}")]
    AlreadyUsedByUser { code: String, user_id: UserId },

    #[error("Promo code '{0}' already exists")]
    DuplicateCode(String),

    #[error("Promo code '{code}' has been fully redeemed")]
    Exhausted { code: String },

    #[error("Promo code invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Promo code storage error: {0}")]
    Infrastructure(String),
}

impl PromoCodeError {
    pub fn unavailable(code: impl Into<String>, reason: UnavailableReason) -> Self {
        PromoCodeError::InvalidPromoCode {
            code: code.into(),
            reason,
        }
    }

    pub fn not_found(code: impl Into<String>) -> Self {
        Self::unavailable(code, UnavailableReason::NotFound)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PromoCodeError::InvalidFormat(_) => ErrorCategory::Validation,
            PromoCodeError::InvalidPromoCode { .. }
            | PromoCodeError::PlanNotApplicable { .. }
            | PromoCodeError::Exhausted { .. } => ErrorCategory::NotAvailable,
            PromoCodeError::AlreadyUsedByUser { .. } | PromoCodeError::DuplicateCode(_) => {
                ErrorCategory::Conflict
            }
            PromoCodeError::InvariantViolation(_) => ErrorCategory::InvariantViolation,
            PromoCodeError::Infrastructure(_) => ErrorCategory::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.category().http_status()
    }
}

impl From<DomainError> for PromoCodeError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::InvariantViolation => PromoCodeError::InvariantViolation(err.message),
            ErrorCode::AlreadyExists => PromoCodeError::DuplicateCode(
                err.details.get("code").cloned().unwrap_or(err.message),
            ),
            _ => PromoCodeError::Infrastructure(err.to_string()),
        }
    }
}
