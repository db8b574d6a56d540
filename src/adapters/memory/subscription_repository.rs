//! In-memory SubscriptionRepository with version compare-and-swap.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, UserId};
use crate::domain::subscription::Subscription;
use crate::ports::SubscriptionRepository;

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Subscription> {
        self.subscriptions.read().await.values().cloned().collect()
    }

    async fn find_where<F>(&self, predicate: F) -> Option<Subscription>
    where
        F: Fn(&Subscription) -> bool,
    {
        self.subscriptions
            .read()
            .await
            .values()
            .find(|s| predicate(s))
            .cloned()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions
            .values()
            .any(|s| s.user_id == subscription.user_id)
        {
            return Err(DomainError::already_exists(format!(
                "User {} already has a subscription",
                subscription.user_id
            ))
            .with_detail("user_id", subscription.user_id.to_string()));
        }
        let mut stored = subscription.clone();
        stored.version = 0;
        subscriptions.insert(stored.id, stored);
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<Subscription, DomainError> {
        let mut subscriptions = self.subscriptions.write().await;
        let stored = subscriptions.get_mut(&subscription.id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription not found: {}", subscription.id),
            )
        })?;
        if stored.version != subscription.version {
            return Err(DomainError::concurrent_modification(format!(
                "subscription {} is at version {}, update was based on {}",
                subscription.id, stored.version, subscription.version
            ))
            .with_detail("subscription_id", subscription.id.to_string()));
        }

        let mut next = subscription.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.find_where(|s| &s.user_id == user_id).await)
    }

    async fn find_by_external_subscription_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .find_where(|s| s.external_subscription_id.as_deref() == Some(external_id))
            .await)
    }

    async fn find_by_external_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .find_where(|s| s.external_customer_id.as_deref() == Some(customer_id))
            .await)
    }
}
