//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `PromoCodeRepository` - Promo codes and their atomic redemption
//! - `PendingRegistrationRepository` - Signup intents awaiting payment
//! - `UserRepository` / `SubscriptionRepository` - Accounts and entitlements
//! - `PaymentRepository` - Payment ledger, keyed by external charge id
//! - `AuditLog` - Append-only record of admin changes
//! - `EntitlementReader` - Cross-account reads for scheduled jobs
//!
//! ## External Services
//!
//! - `PaymentProvider` - Hosted checkout, subscription control, webhooks
//! - `EmailSender` - Fire-and-forget transactional email

mod audit_log;
mod email_sender;
mod entitlement_reader;
mod payment_provider;
mod payment_repository;
mod pending_registration_repository;
mod promo_code_repository;
mod subscription_repository;
mod user_repository;

pub use audit_log::AuditLog;
pub use email_sender::EmailSender;
pub use entitlement_reader::{AccountView, EntitlementReader};
pub use payment_provider::{
    BillingInterval, CheckoutMode, CheckoutSession, CheckoutSessionDetails, CheckoutSessionStatus,
    CreateCheckoutRequest, LineItem, PaymentError, PaymentErrorCode, PaymentProvider,
};
pub use payment_repository::{PaymentRepository, SaveResult};
pub use pending_registration_repository::PendingRegistrationRepository;
pub use promo_code_repository::PromoCodeRepository;
pub use subscription_repository::SubscriptionRepository;
pub use user_repository::UserRepository;
