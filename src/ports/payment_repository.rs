//! Payment ledger repository port.
//!
//! `external_charge_id` is unique. A second insert with the same id is how
//! webhook redelivery is detected, so it reports `AlreadyExists` rather than
//! failing.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::payment::Payment;

/// Result of inserting a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Inserted,
    /// A payment with the same external charge id is already stored.
    AlreadyExists,
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> Result<SaveResult, DomainError>;

    /// Persists refunds appended to an existing payment.
    ///
    /// # Errors
    ///
    /// - `PaymentNotFound` if the payment does not exist
    async fn update(&self, payment: &Payment) -> Result<(), DomainError>;

    async fn find_by_external_charge_id(
        &self,
        external_charge_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Payment>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn PaymentRepository) {}
    }
}
