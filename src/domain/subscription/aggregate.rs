//! Subscription aggregate.
//!
//! Exactly one per user. Transitions happen only through the webhook
//! processor (provider-driven) or the lifecycle manager (admin-driven);
//! stores persist it with a version compare-and-swap.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PriceBreakdown, SubscriptionId, Timestamp, UserId, ValidationError};
use crate::domain::promo::PromoCodeName;

use super::{Plan, PlanPricing, SubscriptionError, SubscriptionStatus};

/// Longest single extension or free grant an admin may issue.
pub const MAX_GRANT_DAYS: i64 = 3650;

/// Data carried by a completed checkout.
#[derive(Debug, Clone)]
pub struct CheckoutActivation {
    pub plan: Plan,
    pub breakdown: PriceBreakdown,
    pub external_customer_id: Option<String>,
    pub external_subscription_id: Option<String>,
    pub promo_code: Option<PromoCodeName>,
}

/// Subscription fields as the provider reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSubscriptionState {
    pub external_subscription_id: String,
    pub external_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_start: Timestamp,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
}

/// Outcome of applying a provider-sourced change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSync {
    Applied,
    /// Event older than the last one applied.
    Stale,
    /// Admin access is never overwritten by the provider.
    AdminOverride,
}

/// Point-in-time view used for audit entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub status: SubscriptionStatus,
    pub plan: Plan,
    pub amount: i64,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub external_customer_id: Option<String>,
    pub external_subscription_id: Option<String>,
    pub status: SubscriptionStatus,
    pub plan: Plan,
    /// Cents charged per period.
    pub amount: i64,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub current_period_start: Timestamp,
    /// `None` means the subscription never expires.
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub cancelled_at: Option<Timestamp>,
    pub promo_code: Option<PromoCodeName>,
    /// `created` time of the newest provider event applied.
    pub last_provider_event_at: Option<Timestamp>,
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// A placeholder subscription that grants nothing.
    pub fn new_inactive(user_id: UserId, now: Timestamp) -> Self {
        Self {
            id: SubscriptionId::new(),
            user_id,
            external_customer_id: None,
            external_subscription_id: None,
            status: SubscriptionStatus::Inactive,
            plan: Plan::Monthly,
            amount: 0,
            original_amount: 0,
            discount_amount: 0,
            current_period_start: now,
            current_period_end: None,
            cancel_at_period_end: false,
            cancelled_at: None,
            promo_code: None,
            last_provider_event_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn breakdown(&self) -> PriceBreakdown {
        PriceBreakdown::with_discount(self.original_amount, self.discount_amount)
    }

    pub fn amounts_consistent(&self) -> bool {
        PriceBreakdown::try_new(self.original_amount, self.discount_amount, self.amount).is_ok()
    }

    pub fn is_local_grant(&self) -> bool {
        self.external_subscription_id.is_none()
    }

    /// Admin access never expires; neither does an unset period end.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        if self.status == SubscriptionStatus::AdminAccess {
            return false;
        }
        match self.current_period_end {
            None => false,
            Some(end) => now.is_after(&end),
        }
    }

    pub fn snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            status: self.status,
            plan: self.plan,
            amount: self.amount,
            original_amount: self.original_amount,
            discount_amount: self.discount_amount,
            current_period_end: self.current_period_end,
            cancel_at_period_end: self.cancel_at_period_end,
        }
    }

    fn set_breakdown(&mut self, breakdown: PriceBreakdown) {
        self.original_amount = breakdown.original_amount();
        self.discount_amount = breakdown.discount_amount();
        self.amount = breakdown.final_amount();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Provider-driven transitions
    // ════════════════════════════════════════════════════════════════════════════

    /// Activates after a paid checkout.
    ///
    /// Period bounds are provisional; the provider's subscription events
    /// overwrite them once they arrive.
    pub fn activate_from_checkout(&mut self, activation: CheckoutActivation, now: Timestamp) {
        self.status = SubscriptionStatus::Active;
        self.plan = activation.plan;
        self.set_breakdown(activation.breakdown);
        self.current_period_start = now;
        self.current_period_end = activation.plan.period_days().map(|days| now.add_days(days));
        self.cancel_at_period_end = false;
        self.cancelled_at = None;
        self.promo_code = activation.promo_code.or(self.promo_code.take());
        if activation.external_customer_id.is_some() {
            self.external_customer_id = activation.external_customer_id;
        }
        if activation.external_subscription_id.is_some() {
            self.external_subscription_id = activation.external_subscription_id;
        }
        self.updated_at = now;
    }

    /// Checkout activation ordered against the provider's subscription
    /// events.
    ///
    /// A checkout older than the last applied provider event only fills in
    /// missing external ids; status, plan and period stay as the provider
    /// left them.
    pub fn apply_checkout(
        &mut self,
        activation: CheckoutActivation,
        event_at: Timestamp,
        now: Timestamp,
    ) -> ProviderSync {
        if let Some(skip) = self.accept_provider_event(event_at) {
            if skip == ProviderSync::Stale {
                if self.external_customer_id.is_none() {
                    self.external_customer_id = activation.external_customer_id;
                }
                if self.external_subscription_id.is_none() {
                    self.external_subscription_id = activation.external_subscription_id;
                }
            }
            return skip;
        }
        self.activate_from_checkout(activation, now);
        self.last_provider_event_at = Some(event_at);
        ProviderSync::Applied
    }

    /// Drops the period end of a promo grant so it never expires.
    pub fn remove_expiry(&mut self, now: Timestamp) {
        self.current_period_end = None;
        self.updated_at = now;
    }

    fn accept_provider_event(&self, event_at: Timestamp) -> Option<ProviderSync> {
        if self.status == SubscriptionStatus::AdminAccess {
            return Some(ProviderSync::AdminOverride);
        }
        if self.last_provider_event_at.is_some_and(|last| event_at.is_before(&last)) {
            return Some(ProviderSync::Stale);
        }
        None
    }

    /// Overwrites status, period bounds and the cancel flag with the
    /// provider's view.
    pub fn apply_provider_state(
        &mut self,
        state: ProviderSubscriptionState,
        event_at: Timestamp,
        now: Timestamp,
    ) -> ProviderSync {
        self.external_subscription_id = Some(state.external_subscription_id);
        if state.external_customer_id.is_some() {
            self.external_customer_id = state.external_customer_id;
        }
        if let Some(skip) = self.accept_provider_event(event_at) {
            return skip;
        }

        self.status = state.status;
        self.current_period_start = state.current_period_start;
        self.current_period_end = state.current_period_end;
        self.cancel_at_period_end = state.cancel_at_period_end;
        if state.status == SubscriptionStatus::Cancelled && self.cancelled_at.is_none() {
            self.cancelled_at = Some(now);
        }
        self.last_provider_event_at = Some(event_at);
        self.updated_at = now;
        ProviderSync::Applied
    }

    /// The provider ended the subscription.
    pub fn mark_deleted(&mut self, event_at: Timestamp, now: Timestamp) -> ProviderSync {
        if let Some(skip) = self.accept_provider_event(event_at) {
            return skip;
        }
        self.status = SubscriptionStatus::Cancelled;
        self.cancel_at_period_end = false;
        self.cancelled_at = Some(self.cancelled_at.unwrap_or(now));
        self.last_provider_event_at = Some(event_at);
        self.updated_at = now;
        ProviderSync::Applied
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Admin-driven transitions
    // ════════════════════════════════════════════════════════════════════════════

    pub fn grant_admin_access(&mut self, now: Timestamp) {
        self.status = SubscriptionStatus::AdminAccess;
        self.plan = Plan::Admin;
        self.set_breakdown(PriceBreakdown::zero());
        self.current_period_start = now;
        self.current_period_end = None;
        self.cancel_at_period_end = false;
        self.cancelled_at = None;
        self.updated_at = now;
    }

    /// Full-discount access for `duration_days`.
    pub fn grant_free_access(
        &mut self,
        plan: Plan,
        original_amount: i64,
        duration_days: i64,
        now: Timestamp,
    ) -> Result<(), SubscriptionError> {
        validate_days("duration_days", duration_days)?;
        if !plan.is_purchasable() {
            return Err(SubscriptionError::InvalidPlanChange(
                "free access is granted on a billable plan".to_string(),
            ));
        }
        self.status = SubscriptionStatus::Active;
        self.plan = plan;
        self.set_breakdown(PriceBreakdown::fully_discounted(original_amount));
        self.current_period_start = now;
        self.current_period_end = Some(now.add_days(duration_days));
        self.cancel_at_period_end = false;
        self.cancelled_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Pushes the period end out by `days`. An unset end stays unlimited.
    pub fn extend(&mut self, days: i64, now: Timestamp) -> Result<(), SubscriptionError> {
        validate_days("days", days)?;
        self.current_period_end = self.current_period_end.map(|end| end.add_days(days));
        if matches!(
            self.status,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Inactive
        ) {
            self.status = SubscriptionStatus::Active;
            self.cancelled_at = None;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Moves to `plan` at its canonical price. Period end is untouched.
    pub fn change_plan(
        &mut self,
        plan: Plan,
        pricing: &PlanPricing,
        now: Timestamp,
    ) -> Result<(), SubscriptionError> {
        if !plan.is_purchasable() {
            return Err(SubscriptionError::InvalidPlanChange(
                "use admin access grants to move to the admin plan".to_string(),
            ));
        }
        if self.status == SubscriptionStatus::AdminAccess {
            return Err(SubscriptionError::InvalidPlanChange(
                "admin access has no billed plan".to_string(),
            ));
        }
        self.plan = plan;
        self.set_breakdown(PriceBreakdown::full_price(pricing.price_for(plan)));
        self.promo_code = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel_immediately(&mut self, now: Timestamp) {
        self.status = SubscriptionStatus::Cancelled;
        self.current_period_end = Some(now);
        self.cancel_at_period_end = false;
        self.cancelled_at = Some(now);
        self.updated_at = now;
    }

    /// Access continues until the period ends. Status is unchanged.
    pub fn schedule_cancellation(&mut self, now: Timestamp) {
        self.cancel_at_period_end = true;
        self.cancelled_at = Some(now);
        self.updated_at = now;
    }

    pub fn reactivate(&mut self, now: Timestamp) -> Result<(), SubscriptionError> {
        if self.is_local_grant() {
            return Err(SubscriptionError::CannotReactivateLocalGrant(self.id));
        }
        self.cancel_at_period_end = false;
        self.cancelled_at = None;
        self.updated_at = now;
        Ok(())
    }
}

fn validate_days(field: &str, days: i64) -> Result<(), ValidationError> {
    if !(1..=MAX_GRANT_DAYS).contains(&days) {
        return Err(ValidationError::out_of_range(field, 1, MAX_GRANT_DAYS, days));
    }
    Ok(())
}
