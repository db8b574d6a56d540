//! ChangePlanHandler - Command handler for moving a subscription to another
//! billed plan at its list price.
//!
//! Local only: the provider-side price is changed through the provider's
//! own dashboard, and its next subscription event confirms the period.

use std::sync::Arc;

use crate::domain::audit::AuditAction;
use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Plan, PlanPricing, SubscriptionError};
use crate::ports::{AuditLog, SubscriptionRepository, UserRepository};

use super::super::support::{mutate_subscription, Mutation};
use super::lifecycle::{load_subscription, record_change, LifecycleResult};

#[derive(Debug, Clone, Copy)]
pub struct ChangePlanCommand {
    pub actor: UserId,
    pub subscription_id: SubscriptionId,
    pub plan: Plan,
}

pub struct ChangePlanHandler {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    audit: Arc<dyn AuditLog>,
    pricing: PlanPricing,
}

impl ChangePlanHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        audit: Arc<dyn AuditLog>,
        pricing: PlanPricing,
    ) -> Self {
        Self {
            users,
            subscriptions,
            audit,
            pricing,
        }
    }

    pub async fn handle(&self, cmd: ChangePlanCommand) -> Result<LifecycleResult, SubscriptionError> {
        let now = Timestamp::now();
        let current = load_subscription(self.subscriptions.as_ref(), &cmd.subscription_id).await?;

        let pricing = self.pricing;
        let mutated = mutate_subscription(self.subscriptions.as_ref(), current, |sub| {
            sub.change_plan(cmd.plan, &pricing, now)?;
            Ok::<_, SubscriptionError>(Mutation::Write(()))
        })
        .await?;

        record_change(
            self.users.as_ref(),
            self.subscriptions.as_ref(),
            self.audit.as_ref(),
            cmd.actor,
            AuditAction::ChangePlan,
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
    use crate::domain::promo::PromoCodeName;
    use crate::domain::subscription::{CheckoutActivation, Subscription, SubscriptionStatus};

    fn handler(stores: &Stores) -> ChangePlanHandler {
        ChangePlanHandler::new(
            stores.users.clone(),
            stores.subscriptions.clone(),
            stores.audit.clone(),
            stores.pricing,
        )
    }

    async fn discounted_monthly(stores: &Stores) -> Subscription {
        let user = stores.add_user("switcher@example.com").await;
        let mut sub = Subscription::new_inactive(user.id, Timestamp::now());
        sub.activate_from_checkout(
            CheckoutActivation {
                plan: Plan::Monthly,
                breakdown: PriceBreakdown::with_discount(3900, 2400),
                external_customer_id: Some("cus_1".to_string()),
                external_subscription_id: Some("sub_1".to_string()),
                promo_code: Some(PromoCodeName::try_new("FRIENDSFAMILY").unwrap()),
            },
            Timestamp::now(),
        );
        stores.subscriptions.insert(&sub).await.unwrap();
        sub
    }

    #[tokio::test]
    async fn annual_at_list_price_keeps_the_period_end() {
        let stores = Stores::new();
        let sub = discounted_monthly(&stores).await;

        let result = handler(&stores)
            .handle(ChangePlanCommand {
                actor: UserId::new(),
                subscription_id: sub.id,
                plan: Plan::Annual,
            })
            .await
            .unwrap();

        let changed = &result.subscription;
        assert_eq!(changed.plan, Plan::Annual);
        assert_eq!((changed.original_amount, changed.discount_amount, changed.amount), (39000, 0, 39000));
        assert_eq!(changed.current_period_end, sub.current_period_end);
        assert!(changed.promo_code.is_none());
        assert_eq!(result.audit_entry.before.map(|s| s.amount), Some(1500));
    }

    #[tokio::test]
    async fn admin_access_has_no_plan_to_change() {
        let stores = Stores::new();
        let mut sub = discounted_monthly(&stores).await;
        sub.status = SubscriptionStatus::AdminAccess;
        stores.subscriptions.update(&sub).await.unwrap();

        let err = handler(&stores)
            .handle(ChangePlanCommand {
                actor: UserId::new(),
                subscription_id: sub.id,
                plan: Plan::Annual,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::InvalidPlanChange(_)));
        assert_eq!(stores.audit.len().await, 0);
    }
}
