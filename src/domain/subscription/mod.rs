//! Subscription lifecycle: plans, statuses and the Subscription aggregate.

mod aggregate;
mod errors;
mod plan;
mod status;

pub use aggregate::{
    CheckoutActivation, ProviderSubscriptionState, ProviderSync, Subscription,
    SubscriptionSnapshot, MAX_GRANT_DAYS,
};
pub use errors::SubscriptionError;
pub use plan::{Plan, PlanPricing, SubscriptionTier};
pub use status::SubscriptionStatus;
