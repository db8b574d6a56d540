//! User entity and its cached entitlement fields.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId, ValidationError};
use crate::domain::promo::PromoCodeName;
use crate::domain::subscription::{Subscription, SubscriptionStatus, SubscriptionTier};

use super::Email;

const MAX_NAME_LEN: usize = 100;

/// Fields needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub is_verified: bool,
    pub registration_promo_code: Option<PromoCodeName>,
}

/// A registered account. Never hard-deleted.
///
/// `subscription_status`, `subscription_tier` and `has_active_subscription`
/// mirror the user's Subscription and are only written by
/// [`User::apply_entitlement`]. Stores write it with a `version`
/// compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub is_verified: bool,
    pub is_admin: bool,
    pub subscription_status: SubscriptionStatus,
    pub subscription_tier: SubscriptionTier,
    pub has_active_subscription: bool,
    pub trial_used: bool,
    pub registration_promo_code: Option<PromoCodeName>,
    #[serde(default)]
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn register(new: NewUser, now: Timestamp) -> Result<Self, ValidationError> {
        let name = validate_name(&new.name)?;
        if new.password_hash.trim().is_empty() {
            return Err(ValidationError::empty_field("password_hash"));
        }

        Ok(Self {
            id: UserId::new(),
            name,
            email: new.email,
            password_hash: new.password_hash,
            is_verified: new.is_verified,
            is_admin: false,
            subscription_status: SubscriptionStatus::Inactive,
            subscription_tier: SubscriptionTier::Free,
            has_active_subscription: false,
            trial_used: false,
            registration_promo_code: new.registration_promo_code,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Recomputes the cached entitlement fields from the subscription.
    ///
    /// Returns true if anything changed.
    pub fn apply_entitlement(&mut self, subscription: Option<&Subscription>, now: Timestamp) -> bool {
        let status = subscription.map_or(SubscriptionStatus::Inactive, |s| s.status);
        let tier = match subscription {
            Some(s) if s.status.grants_access() => s.plan.tier(),
            _ => SubscriptionTier::Free,
        };
        let has_active = status.grants_access();
        let trial_used = self.trial_used || status == SubscriptionStatus::Trialing;

        let changed = self.subscription_status != status
            || self.subscription_tier != tier
            || self.has_active_subscription != has_active
            || self.trial_used != trial_used;

        self.subscription_status = status;
        self.subscription_tier = tier;
        self.has_active_subscription = has_active;
        self.trial_used = trial_used;
        if changed {
            self.updated_at = now;
        }
        changed
    }

    /// True if the cached fields disagree with `subscription`.
    pub fn entitlement_cache_is_stale(&self, subscription: Option<&Subscription>) -> bool {
        let mut refreshed = self.clone();
        refreshed.apply_entitlement(subscription, self.updated_at)
    }

    pub fn promote_to_admin(&mut self, now: Timestamp) {
        self.is_admin = true;
        self.updated_at = now;
    }

    pub fn mark_verified(&mut self, now: Timestamp) {
        self.is_verified = true;
        self.updated_at = now;
    }
}

fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::empty_field("name"));
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::out_of_range("name_length", 1, MAX_NAME_LEN as i64, len as i64));
    }
    Ok(name.to_string())
}
