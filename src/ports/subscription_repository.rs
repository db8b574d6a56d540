//! Subscription repository port.
//!
//! # Optimistic concurrency
//!
//! Every subscription carries a `version`. `update` succeeds only if the
//! stored version equals the caller's, and bumps it. A mismatch returns
//! `ConcurrentModification`; callers reload and reapply. This serializes
//! all writers of one subscription without holding locks across provider
//! calls.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::domain::subscription::Subscription;

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Stores a new subscription at version 0.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the user already has a subscription
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Compare-and-swap on `version`; returns the stored copy with the
    /// bumped version.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the subscription does not exist
    /// - `ConcurrentModification` if the stored version differs
    async fn update(&self, subscription: &Subscription) -> Result<Subscription, DomainError>;

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError>;

    async fn find_by_external_subscription_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    async fn find_by_external_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SubscriptionRepository) {}
    }
}
