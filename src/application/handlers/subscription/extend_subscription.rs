//! ExtendSubscriptionHandler - Command handler for pushing out a period end.

use std::sync::Arc;

use crate::domain::audit::AuditAction;
use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::SubscriptionError;
use crate::ports::{AuditLog, SubscriptionRepository, UserRepository};

use super::super::support::{mutate_subscription, Mutation};
use super::lifecycle::{load_subscription, record_change, LifecycleResult};

#[derive(Debug, Clone, Copy)]
pub struct ExtendSubscriptionCommand {
    pub actor: UserId,
    pub subscription_id: SubscriptionId,
    pub days: i64,
}

pub struct ExtendSubscriptionHandler {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    audit: Arc<dyn AuditLog>,
}

impl ExtendSubscriptionHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            users,
            subscriptions,
            audit,
        }
    }

    pub async fn handle(&self, cmd: ExtendSubscriptionCommand) -> Result<LifecycleResult, SubscriptionError> {
        let now = Timestamp::now();
        let current = load_subscription(self.subscriptions.as_ref(), &cmd.subscription_id).await?;

        let mutated = mutate_subscription(self.subscriptions.as_ref(), current, |sub| {
            sub.extend(cmd.days, now)?;
            Ok::<_, SubscriptionError>(Mutation::Write(()))
        })
        .await?;

        record_change(
            self.users.as_ref(),
            self.subscriptions.as_ref(),
            self.audit.as_ref(),
            cmd.actor,
            AuditAction::ExtendSubscription,
            mutated,
            now,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::fixtures::Stores;
    use crate::domain::subscription::{Subscription, SubscriptionStatus};

    fn handler(stores: &Stores) -> ExtendSubscriptionHandler {
        ExtendSubscriptionHandler::new(
            stores.users.clone(),
            stores.subscriptions.clone(),
            stores.audit.clone(),
        )
    }

    async fn subscription(
        stores: &Stores,
        status: SubscriptionStatus,
        end: Option<Timestamp>,
    ) -> Subscription {
        let user = stores.add_user("member@example.com").await;
        let mut sub = Subscription::new_inactive(user.id, Timestamp::now());
        sub.status = status;
        sub.current_period_end = end;
        stores.subscriptions.insert(&sub).await.unwrap();
        sub
    }

    fn command(subscription_id: SubscriptionId, days: i64) -> ExtendSubscriptionCommand {
        ExtendSubscriptionCommand {
            actor: UserId::new(),
            subscription_id,
            days,
        }
    }

    #[tokio::test]
    async fn adds_days_to_the_period_end() {
        let stores = Stores::new();
        let end = Timestamp::now().add_days(5);
        let sub = subscription(&stores, SubscriptionStatus::Active, Some(end)).await;

        let result = handler(&stores).handle(command(sub.id, 10)).await.unwrap();

        assert_eq!(result.subscription.current_period_end, Some(end.add_days(10)));
        assert_eq!(stores.audit.len().await, 1);
    }

    #[tokio::test]
    async fn extending_a_cancelled_subscription_reactivates_it() {
        let stores = Stores::new();
        let sub = subscription(
            &stores,
            SubscriptionStatus::Cancelled,
            Some(Timestamp::now().add_days(-1)),
        )
        .await;

        let result = handler(&stores).handle(command(sub.id, 30)).await.unwrap();

        assert_eq!(result.subscription.status, SubscriptionStatus::Active);
        assert!(result.premium_access);
        let user = stores.users.find_by_id(&sub.user_id).await.unwrap().unwrap();
        assert!(user.has_active_subscription);
    }

    #[tokio::test]
    async fn unlimited_subscription_stays_unlimited() {
        let stores = Stores::new();
        let sub = subscription(&stores, SubscriptionStatus::Active, None).await;

        let result = handler(&stores).handle(command(sub.id, 30)).await.unwrap();

        assert!(result.subscription.current_period_end.is_none());
    }

    #[tokio::test]
    async fn unknown_subscription_is_not_found() {
        let stores = Stores::new();
        let id = SubscriptionId::new();

        let err = handler(&stores).handle(command(id, 30)).await.unwrap_err();

        assert_eq!(err, SubscriptionError::NotFound(id));
    }
}
