//! In-memory adapters.
//!
//! Each store keeps its data behind a `tokio::sync::RwLock` and performs
//! every conditional update (promo redeem, subscription CAS, payment
//! insert-if-absent) under a single write guard. Used by tests and for
//! running the engine without a database.

mod audit_log;
mod entitlement_reader;
mod payment_repository;
mod pending_registration_repository;
mod promo_code_repository;
mod subscription_repository;
mod user_repository;

pub use audit_log::InMemoryAuditLog;
pub use entitlement_reader::InMemoryEntitlementReader;
pub use payment_repository::InMemoryPaymentRepository;
pub use pending_registration_repository::InMemoryPendingRegistrationRepository;
pub use promo_code_repository::InMemoryPromoCodeRepository;
pub use subscription_repository::InMemorySubscriptionRepository;
pub use user_repository::InMemoryUserRepository;
