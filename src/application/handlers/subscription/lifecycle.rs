//! Steps every admin lifecycle operation ends with: audit the change,
//! refresh the user's cached entitlement and report the resulting access.

use tracing::{error, info};

use crate::domain::audit::{AuditAction, AuditEntry};
use crate::domain::entitlement::has_premium_access;
use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::{AuditLog, SubscriptionRepository, UserRepository};

use super::super::support::{sync_user_entitlement, Mutated};

/// Outcome of an admin lifecycle operation.
#[derive(Debug, Clone)]
pub struct LifecycleResult {
    pub subscription: Subscription,
    pub audit_entry: AuditEntry,
    /// Access as resolved after the change.
    pub premium_access: bool,
}

pub(super) async fn load_subscription(
    subscriptions: &dyn SubscriptionRepository,
    id: &SubscriptionId,
) -> Result<Subscription, SubscriptionError> {
    subscriptions
        .find_by_id(id)
        .await?
        .ok_or(SubscriptionError::NotFound(*id))
}

pub(super) async fn record_change(
    users: &dyn UserRepository,
    subscriptions: &dyn SubscriptionRepository,
    audit: &dyn AuditLog,
    actor: UserId,
    action: AuditAction,
    mutated: Mutated<()>,
    now: Timestamp,
) -> Result<LifecycleResult, SubscriptionError> {
    let subscription = mutated.subscription;

    // 1. Audit; the change is already stored, so a failed append is only reported
    let entry = AuditEntry::new(
        actor,
        action,
        subscription.user_id,
        subscription.id,
        mutated.before.as_ref().map(Subscription::snapshot),
        subscription.snapshot(),
        now,
    );
    if let Err(err) = audit.append(&entry).await {
        error!(
            audit_entry_id = %entry.id,
            action = %action,
            subscription_id = %subscription.id,
            error = %err,
            "audit entry could not be written"
        );
    }

    // 2. Refresh the user's cache
    let user = sync_user_entitlement(users, subscriptions, &subscription.user_id, now).await?;
    let premium_access = user
        .as_ref()
        .is_some_and(|u| has_premium_access(u, Some(&subscription), now));

    info!(
        actor = %actor,
        action = %action,
        user_id = %subscription.user_id,
        subscription_id = %subscription.id,
        status = subscription.status.as_str(),
        premium_access,
        "subscription changed by admin"
    );
    Ok(LifecycleResult {
        subscription,
        audit_entry: entry,
        premium_access,
    })
}
