//! `customer.subscription.{created,updated,deleted}`: mirrors the provider's
//! view of a subscription onto the local one.
//!
//! Events older than the last one applied are skipped. Admin access is
//! never overwritten; only the provider ids are recorded on it.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::registration::{CheckoutMetadata, CheckoutSubject};
use crate::domain::subscription::{
    ProviderSubscriptionState, ProviderSync, Subscription, SubscriptionStatus,
};
use crate::domain::webhook::{
    EventType, ProviderEvent, ProviderEventKind, ProviderSubscription, WebhookError, WebhookOutcome,
};
use crate::ports::{SubscriptionRepository, UserRepository};

use super::super::support::{
    mutate_subscription, sync_user_entitlement, upsert_subscription, Mutated, Mutation,
};
use super::{WebhookDependencies, WebhookEventHandler};

const EVENT_TYPES: &[EventType] = &[
    EventType::SubscriptionCreated,
    EventType::SubscriptionUpdated,
    EventType::SubscriptionDeleted,
];

pub struct SubscriptionEventsHandler {
    deps: WebhookDependencies,
}

impl SubscriptionEventsHandler {
    pub fn new(deps: WebhookDependencies) -> Self {
        Self { deps }
    }

    /// Created and updated carry the full provider state.
    async fn sync_state(
        &self,
        event: &ProviderEvent,
        provider_sub: &ProviderSubscription,
        may_create: bool,
    ) -> Result<WebhookOutcome, WebhookError> {
        let now = Timestamp::now();

        // 1. Map the provider status
        let Some(status) = SubscriptionStatus::from_provider_status(&provider_sub.status) else {
            return Ok(WebhookOutcome::dropped(format!(
                "unknown provider status '{}'",
                provider_sub.status
            )));
        };
        let state = ProviderSubscriptionState {
            external_subscription_id: provider_sub.subscription_id.clone(),
            external_customer_id: provider_sub.customer_id.clone(),
            status,
            current_period_start: provider_sub.current_period_start,
            current_period_end: provider_sub.current_period_end,
            cancel_at_period_end: provider_sub.cancel_at_period_end,
        };
        let apply = |sub: &mut Subscription| {
            Ok::<_, WebhookError>(match sub.apply_provider_state(state.clone(), event.created, now) {
                ProviderSync::Stale => Mutation::Skip(ProviderSync::Stale),
                sync => Mutation::Write(sync),
            })
        };

        // 2. Locate the local subscription
        let mutated = match self.locate(provider_sub).await? {
            Some(current) => {
                mutate_subscription(self.deps.subscriptions.as_ref(), current, apply).await?
            }
            None if may_create => match self.owner_from_metadata(provider_sub).await? {
                Some(user_id) => {
                    upsert_subscription(self.deps.subscriptions.as_ref(), user_id, now, apply).await?
                }
                None => {
                    return Ok(WebhookOutcome::dropped(format!(
                        "no user for subscription {}",
                        provider_sub.subscription_id
                    )))
                }
            },
            None => {
                return Ok(WebhookOutcome::dropped(format!(
                    "subscription {} not found",
                    provider_sub.subscription_id
                )))
            }
        };

        self.finish(event, mutated, now).await
    }

    async fn delete(
        &self,
        event: &ProviderEvent,
        provider_sub: &ProviderSubscription,
    ) -> Result<WebhookOutcome, WebhookError> {
        let now = Timestamp::now();
        let Some(current) = self
            .deps
            .subscriptions
            .find_by_external_subscription_id(&provider_sub.subscription_id)
            .await?
        else {
            return Ok(WebhookOutcome::dropped(format!(
                "subscription {} not found",
                provider_sub.subscription_id
            )));
        };

        let mutated = mutate_subscription(self.deps.subscriptions.as_ref(), current, |sub| {
            Ok::<_, WebhookError>(match sub.mark_deleted(event.created, now) {
                ProviderSync::Applied => Mutation::Write(ProviderSync::Applied),
                skipped => Mutation::Skip(skipped),
            })
        })
        .await?;

        self.finish(event, mutated, now).await
    }

    async fn finish(
        &self,
        event: &ProviderEvent,
        mutated: Mutated<ProviderSync>,
        now: Timestamp,
    ) -> Result<WebhookOutcome, WebhookError> {
        let subscription = &mutated.subscription;
        match mutated.value {
            ProviderSync::Stale => {
                debug!(
                    event_id = %event.id,
                    subscription_id = %subscription.id,
                    "stale subscription event skipped"
                );
                return Ok(WebhookOutcome::Stale);
            }
            ProviderSync::AdminOverride => info!(
                subscription_id = %subscription.id,
                "admin access kept over provider state"
            ),
            ProviderSync::Applied => info!(
                subscription_id = %subscription.id,
                user_id = %subscription.user_id,
                status = subscription.status.as_str(),
                cancel_at_period_end = subscription.cancel_at_period_end,
                "subscription synced from provider"
            ),
        }

        if mutated.written {
            sync_user_entitlement(
                self.deps.users.as_ref(),
                self.deps.subscriptions.as_ref(),
                &subscription.user_id,
                now,
            )
            .await?;
        }
        Ok(WebhookOutcome::applied())
    }

    async fn locate(&self, provider_sub: &ProviderSubscription) -> Result<Option<Subscription>, WebhookError> {
        let subscriptions = &self.deps.subscriptions;
        if let Some(sub) = subscriptions
            .find_by_external_subscription_id(&provider_sub.subscription_id)
            .await?
        {
            return Ok(Some(sub));
        }
        match &provider_sub.customer_id {
            Some(customer_id) => Ok(subscriptions.find_by_external_customer_id(customer_id).await?),
            None => Ok(None),
        }
    }

    /// The checkout metadata is copied onto the provider subscription.
    async fn owner_from_metadata(
        &self,
        provider_sub: &ProviderSubscription,
    ) -> Result<Option<UserId>, WebhookError> {
        let Ok(metadata) = CheckoutMetadata::from_map(&provider_sub.metadata) else {
            return Ok(None);
        };
        let user = match metadata.subject {
            CheckoutSubject::ExistingUser { user_id } => self.deps.users.find_by_id(&user_id).await?,
            CheckoutSubject::Registration { email, .. } => self.deps.users.find_by_email(&email).await?,
        };
        Ok(user.map(|u| u.id))
    }
}

#[async_trait]
impl WebhookEventHandler for SubscriptionEventsHandler {
    fn event_types(&self) -> &'static [EventType] {
        EVENT_TYPES
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        match &event.kind {
            ProviderEventKind::SubscriptionCreated(sub) => self.sync_state(event, sub, true).await,
            ProviderEventKind::SubscriptionUpdated(sub) => self.sync_state(event, sub, false).await,
            ProviderEventKind::SubscriptionDeleted(sub) => self.delete(event, sub).await,
            other => Ok(WebhookOutcome::dropped(format!(
                "unexpected payload for {}",
                other.type_name()
            ))),
        }
    }
}
