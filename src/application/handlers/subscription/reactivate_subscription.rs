//! ReactivateSubscriptionHandler - Command handler for withdrawing a pending
//! cancellation.
//!
//! Only provider-backed subscriptions can be reactivated; a local grant that
//! was terminated has nothing to resume.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::domain::audit::AuditAction;
use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::SubscriptionError;
use crate::ports::{AuditLog, PaymentProvider, SubscriptionRepository, UserRepository};

use super::super::support::{call_provider, mutate_subscription, Mutation};
use super::lifecycle::{load_subscription, record_change, LifecycleResult};

#[derive(Debug, Clone, Copy)]
pub struct ReactivateSubscriptionCommand {
    pub actor: UserId,
    pub subscription_id: SubscriptionId,
}

pub struct ReactivateSubscriptionHandler {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    audit: Arc<dyn AuditLog>,
    provider: Arc<dyn PaymentProvider>,
    provider_timeout: Duration,
}

impl ReactivateSubscriptionHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        audit: Arc<dyn AuditLog>,
        provider: Arc<dyn PaymentProvider>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            users,
            subscriptions,
            audit,
            provider,
            provider_timeout,
        }
    }

    pub async fn handle(
        &self,
        cmd: ReactivateSubscriptionCommand,
    ) -> Result<LifecycleResult, SubscriptionError> {
        let now = Timestamp::now();
        let current = load_subscription(self.subscriptions.as_ref(), &cmd.subscription_id).await?;

        // 1. Clear the pending cancellation
        let mutated = mutate_subscription(self.subscriptions.as_ref(), current, |sub| {
            sub.reactivate(now)?;
            Ok::<_, SubscriptionError>(Mutation::Write(()))
        })
        .await?;

        // 2. Tell the provider
        if let Some(external_id) = mutated.subscription.external_subscription_id.clone() {
            let result = call_provider(
                self.provider_timeout,
                "reactivate_subscription",
                self.provider.reactivate_subscription(&external_id),
            )
            .await;
            if let Err(err) = result {
                warn!(
                    subscription_id = %mutated.subscription.id,
                    external_subscription_id = %external_id,
                    error = %err,
                    "provider reactivation failed, local change kept"
                );
            }
        }

        record_change(
            self.users.as_ref(),
            self.subscriptions.as_ref(),
            self.audit.as_ref(),
            cmd.actor,
            AuditAction::ReactivateSubscription,
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
    use crate::domain::foundation::PriceBreakdown;
    use crate::domain::subscription::{CheckoutActivation, Plan, Subscription};

    fn handler(stores: &Stores) -> ReactivateSubscriptionHandler {
        ReactivateSubscriptionHandler::new(
            stores.users.clone(),
            stores.subscriptions.clone(),
            stores.audit.clone(),
            Arc::new(stores.provider.clone()),
            Duration::from_secs(5),
        )
    }

    async fn cancelling(stores: &Stores, external_id: Option<&str>) -> Subscription {
        let user = stores.add_user("wavering@example.com").await;
        let mut sub = Subscription::new_inactive(user.id, Timestamp::now());
        sub.activate_from_checkout(
            CheckoutActivation {
                plan: Plan::Monthly,
                breakdown: PriceBreakdown::full_price(3900),
                external_customer_id: None,
                external_subscription_id: external_id.map(str::to_string),
                promo_code: None,
            },
            Timestamp::now(),
        );
        sub.schedule_cancellation(Timestamp::now());
        stores.subscriptions.insert(&sub).await.unwrap();
        sub
    }

    #[tokio::test]
    async fn clears_the_pending_cancellation() {
        let stores = Stores::new();
        let sub = cancelling(&stores, Some("sub_1")).await;

        let result = handler(&stores)
            .handle(ReactivateSubscriptionCommand {
                actor: UserId::new(),
                subscription_id: sub.id,
            })
            .await
            .unwrap();

        assert!(!result.subscription.cancel_at_period_end);
        assert!(result.subscription.cancelled_at.is_none());
        assert_eq!(result.audit_entry.before.map(|s| s.cancel_at_period_end), Some(true));
        assert!(stores.provider.was_called("reactivate_subscription"));
    }

    #[tokio::test]
    async fn local_grant_cannot_be_reactivated() {
        let stores = Stores::new();
        let sub = cancelling(&stores, None).await;

        let err = handler(&stores)
            .handle(ReactivateSubscriptionCommand {
                actor: UserId::new(),
                subscription_id: sub.id,
            })
            .await
            .unwrap_err();

        assert_eq!(err, SubscriptionError::CannotReactivateLocalGrant(sub.id));
        let stored = stores.subscriptions.find_by_id(&sub.id).await.unwrap().unwrap();
        assert!(stored.cancel_at_period_end);
        assert_eq!(stores.audit.len().await, 0);
    }
}
