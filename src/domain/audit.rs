//! Immutable audit entries for administrative subscription changes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{AuditEntryId, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::SubscriptionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    GrantAdminAccess,
    GrantFreeAccess,
    ExtendSubscription,
    ChangePlan,
    CancelSubscription,
    ReactivateSubscription,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::GrantAdminAccess => "grant_admin_access",
            AuditAction::GrantFreeAccess => "grant_free_access",
            AuditAction::ExtendSubscription => "extend_subscription",
            AuditAction::ChangePlan => "change_plan",
            AuditAction::CancelSubscription => "cancel_subscription",
            AuditAction::ReactivateSubscription => "reactivate_subscription",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub actor: UserId,
    pub action: AuditAction,
    pub target_user_id: UserId,
    pub subscription_id: SubscriptionId,
    /// `None` when the operation created the subscription.
    pub before: Option<SubscriptionSnapshot>,
    pub after: SubscriptionSnapshot,
    pub occurred_at: Timestamp,
}

impl AuditEntry {
    pub fn new(
        actor: UserId,
        action: AuditAction,
        target_user_id: UserId,
        subscription_id: SubscriptionId,
        before: Option<SubscriptionSnapshot>,
        after: SubscriptionSnapshot,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            actor,
            action,
            target_user_id,
            subscription_id,
            before,
            after,
            occurred_at,
        }
    }
}
