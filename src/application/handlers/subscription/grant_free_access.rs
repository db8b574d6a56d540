//! GrantFreeAccessHandler - Command handler for time-boxed free access.
//!
//! The plan's list price is recorded as fully discounted, so the ledger
//! shows what was given away.

use std::sync::Arc;

use crate::domain::audit::AuditAction;
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{Plan, PlanPricing, SubscriptionError};
use crate::ports::{AuditLog, SubscriptionRepository, UserRepository};

use super::super::support::{upsert_subscription, Mutation};
use super::lifecycle::{record_change, LifecycleResult};

#[derive(Debug, Clone, Copy)]
pub struct GrantFreeAccessCommand {
    pub actor: UserId,
    pub user_id: UserId,
    pub duration_days: i64,
    pub plan: Plan,
}

pub struct GrantFreeAccessHandler {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    audit: Arc<dyn AuditLog>,
    pricing: PlanPricing,
}

impl GrantFreeAccessHandler {
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

    pub async fn handle(&self, cmd: GrantFreeAccessCommand) -> Result<LifecycleResult, SubscriptionError> {
        let now = Timestamp::now();

        // 1. The user must exist
        if self.users.find_by_id(&cmd.user_id).await?.is_none() {
            return Err(SubscriptionError::UserNotFound(cmd.user_id));
        }

        // 2. Grant
        let original_amount = self.pricing.price_for(cmd.plan);
        let mutated = upsert_subscription(self.subscriptions.as_ref(), cmd.user_id, now, |sub| {
            sub.grant_free_access(cmd.plan, original_amount, cmd.duration_days, now)?;
            Ok::<_, SubscriptionError>(Mutation::Write(()))
        })
        .await?;

        record_change(
            self.users.as_ref(),
            self.subscriptions.as_ref(),
            self.audit.as_ref(),
            cmd.actor,
            AuditAction::GrantFreeAccess,
            mutated,
            now,
        )
        .await
    }
}
