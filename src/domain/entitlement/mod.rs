//! Entitlement resolver.
//!
//! Pure decision over the user's admin flag and their subscription. The
//! cached `has_active_subscription` on the user is never consulted here.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::domain::user::User;

/// Why access was granted or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessBasis {
    AdminUser,
    AdminAccess,
    ActiveSubscription,
    Trial,
    Expired,
    NoEntitlingStatus,
    NoSubscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub granted: bool,
    pub basis: AccessBasis,
}

pub fn resolve_access(
    user: &User,
    subscription: Option<&Subscription>,
    now: Timestamp,
) -> AccessDecision {
    let (granted, basis) = if user.is_admin {
        (true, AccessBasis::AdminUser)
    } else {
        match subscription {
            None => (false, AccessBasis::NoSubscription),
            Some(sub) if !sub.status.grants_access() => (false, AccessBasis::NoEntitlingStatus),
            Some(sub) if sub.is_expired(now) => (false, AccessBasis::Expired),
            Some(sub) => match sub.status {
                SubscriptionStatus::AdminAccess => (true, AccessBasis::AdminAccess),
                SubscriptionStatus::Trialing => (true, AccessBasis::Trial),
                _ => (true, AccessBasis::ActiveSubscription),
            },
        }
    };
    AccessDecision { granted, basis }
}

pub fn has_premium_access(user: &User, subscription: Option<&Subscription>, now: Timestamp) -> bool {
    resolve_access(user, subscription, now).granted
}
