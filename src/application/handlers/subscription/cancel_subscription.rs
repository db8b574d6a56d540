//! CancelSubscriptionHandler - Command handler for admin cancellation.
//!
//! The local change is authoritative. The provider is told afterwards on a
//! best-effort basis; a failure or timeout there is logged and the
//! provider's own events reconcile later.

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
pub struct CancelSubscriptionCommand {
    pub actor: UserId,
    pub subscription_id: SubscriptionId,
    /// End access now instead of at the end of the current period.
    pub immediate: bool,
}

pub struct CancelSubscriptionHandler {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    audit: Arc<dyn AuditLog>,
    provider: Arc<dyn PaymentProvider>,
    provider_timeout: Duration,
}

impl CancelSubscriptionHandler {
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

    pub async fn handle(&self, cmd: CancelSubscriptionCommand) -> Result<LifecycleResult, SubscriptionError> {
        let now = Timestamp::now();
        let current = load_subscription(self.subscriptions.as_ref(), &cmd.subscription_id).await?;

        // 1. Cancel locally
        let mutated = mutate_subscription(self.subscriptions.as_ref(), current, |sub| {
            if cmd.immediate {
                sub.cancel_immediately(now);
            } else {
                sub.schedule_cancellation(now);
            }
            Ok::<_, SubscriptionError>(Mutation::Write(()))
        })
        .await?;

        // 2. Tell the provider
        if let Some(external_id) = mutated.subscription.external_subscription_id.clone() {
            let at_period_end = !cmd.immediate;
            let result = call_provider(
                self.provider_timeout,
                "cancel_subscription",
                self.provider.cancel_subscription(&external_id, at_period_end),
            )
            .await;
            if let Err(err) = result {
                warn!(
                    subscription_id = %mutated.subscription.id,
                    external_subscription_id = %external_id,
                    at_period_end,
                    error = %err,
                    "provider cancellation failed, local cancellation kept"
                );
            }
        }

        record_change(
            self.users.as_ref(),
            self.subscriptions.as_ref(),
            self.audit.as_ref(),
            cmd.actor,
            AuditAction::CancelSubscription,
            mutated,
            now,
        )
        .await
    }
}
