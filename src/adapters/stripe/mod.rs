//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port for Stripe integration, including:
//! - Hosted checkout sessions and session lookup
//! - Subscription cancellation and reactivation
//! - Webhook signature verification and event decoding
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! Read from `ENTITLEMENTS__PAYMENT__STRIPE_API_KEY` and
//! `ENTITLEMENTS__PAYMENT__STRIPE_WEBHOOK_SECRET` (whsec_...).

mod mock_payment_provider;
mod stripe_adapter;
mod webhook_types;

pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_types::{
    parse_event, StripeCharge, StripeCheckoutSession, StripeInvoice, StripeRefund,
    StripeSubscription, StripeWebhookEvent,
};
