//! Registration and checkout handlers.
//!
//! ## Commands
//! - Starting a signup (pending, or direct when the price is zero)
//! - Creating a hosted checkout session
//! - Sweeping expired pending registrations
//!
//! ## Queries
//! - Registration status by email or checkout session

mod begin_registration;
mod create_checkout_session;
mod purge_expired_registrations;
mod registration_status;

// Commands
pub use begin_registration::{
    BeginRegistrationCommand, BeginRegistrationHandler, BeginRegistrationResult,
};
pub use create_checkout_session::{
    CheckoutFor, CheckoutSettings, CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
    CreateCheckoutSessionResult,
};
pub use purge_expired_registrations::{
    PurgeExpiredRegistrationsCommand, PurgeExpiredRegistrationsHandler,
    PurgeExpiredRegistrationsResult,
};

// Queries
pub use registration_status::{RegistrationStatusHandler, RegistrationStatusQuery};
