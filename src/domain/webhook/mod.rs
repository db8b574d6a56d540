//! Webhook events from the payment provider.

mod errors;
mod events;
mod verifier;

pub use errors::{WebhookError, WebhookOutcome};
pub use events::{
    CheckoutCompleted, EventType, ProviderCharge, ProviderEvent, ProviderEventKind,
    ProviderInvoice, ProviderRefund, ProviderSubscription,
};
pub use verifier::{sign_payload, SignatureHeader, WebhookVerifier, DEFAULT_TOLERANCE_SECS};
