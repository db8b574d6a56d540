//! Pending registrations and the checkout metadata that resumes them.

mod errors;
mod metadata;
mod pending;

pub use errors::RegistrationError;
pub use metadata::{CheckoutMetadata, CheckoutSubject, MetadataError, METADATA_VERSION};
pub use pending::{
    NewPendingRegistration, PendingRegistration, RegistrationState, RegistrationWindows,
};

/// Answer to "where is this signup?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// Pending record exists, no checkout yet.
    Pending,
    /// Checkout session created and not yet confirmed.
    CheckoutStarted {
        session_id: String,
        /// Older than the stale window; the provider has been consulted.
        stale: bool,
        /// Provider reports the session paid; the webhook has not landed yet.
        payment_confirmed: bool,
    },
    Expired,
    /// A user exists for the email.
    Completed,
    NotFound,
}
