//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, the state machine trait and the error
//! vocabulary used by every other domain module.

mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCategory, ErrorCode, ValidationError};
pub use ids::{AuditEntryId, PaymentId, PendingRegistrationId, PromoCodeId, SubscriptionId, UserId};
pub use money::PriceBreakdown;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
