//! Pending registration repository port.
//!
//! At most one live (unexpired) record per email. The check and the insert
//! happen under one lock or transaction, so two concurrent signups for the
//! same email cannot both succeed.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PendingRegistrationId, Timestamp};
use crate::domain::registration::PendingRegistration;
use crate::domain::user::Email;

#[async_trait]
pub trait PendingRegistrationRepository: Send + Sync {
    /// Stores a new pending record, replacing an expired one for the same
    /// email.
    ///
    /// # Errors
    ///
    /// - `EmailInUse` if a live record already holds the email
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, pending: &PendingRegistration, now: Timestamp) -> Result<(), DomainError>;

    /// # Errors
    ///
    /// - `PendingRegistrationNotFound` if the record is gone
    async fn update(&self, pending: &PendingRegistration) -> Result<(), DomainError>;

    async fn find_by_id(
        &self,
        id: &PendingRegistrationId,
    ) -> Result<Option<PendingRegistration>, DomainError>;

    /// Returns the record for the email, expired or not.
    async fn find_by_email(&self, email: &Email) -> Result<Option<PendingRegistration>, DomainError>;

    async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<PendingRegistration>, DomainError>;

    /// Removes the record. Returns false if it was already gone.
    async fn delete(&self, id: &PendingRegistrationId) -> Result<bool, DomainError>;

    /// Removes every record with `expires_at <= now`; returns how many.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError>;
}
