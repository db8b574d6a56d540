//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - In-process stores for tests and database-less runs
//! - `postgres` - sqlx-backed repositories
//! - `stripe` - Payment provider client, mock and webhook decoding
//! - `email` - Logging and recording email senders

pub mod email;
pub mod memory;
pub mod postgres;
pub mod stripe;

pub use email::{LoggingEmailSender, RecordingEmailSender};
pub use memory::{
    InMemoryAuditLog, InMemoryEntitlementReader, InMemoryPaymentRepository,
    InMemoryPendingRegistrationRepository, InMemoryPromoCodeRepository,
    InMemorySubscriptionRepository, InMemoryUserRepository,
};
pub use postgres::{
    PostgresPaymentRepository, PostgresPromoCodeRepository, PostgresSubscriptionRepository,
};
pub use stripe::{MockPaymentProvider, StripeConfig, StripePaymentAdapter};
