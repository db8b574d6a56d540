//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations, grouped by
//! bounded context. Every handler holds its ports as `Arc<dyn Port>` and is
//! shared across tasks.

pub mod entitlement;
pub mod promo;
pub mod registration;
pub mod reporting;
pub mod subscription;
pub mod webhook;

mod support;

#[cfg(test)]
pub(crate) mod fixtures;

pub use entitlement::{CheckPremiumAccessHandler, CheckPremiumAccessQuery, CheckPremiumAccessResult};
pub use promo::{
    CreatePromoCodeCommand, CreatePromoCodeHandler, PricePlanHandler, PricePlanQuery,
    RedeemPromoCodeCommand, RedeemPromoCodeHandler, SeedPresetPromoCodesCommand,
    SeedPresetPromoCodesHandler, SeedPresetPromoCodesResult, UpdatePromoCodeCommand,
    UpdatePromoCodeHandler,
};
pub use registration::{
    BeginRegistrationCommand, BeginRegistrationHandler, BeginRegistrationResult, CheckoutFor,
    CheckoutSettings, CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
    CreateCheckoutSessionResult, PurgeExpiredRegistrationsCommand,
    PurgeExpiredRegistrationsHandler, PurgeExpiredRegistrationsResult, RegistrationStatusHandler,
    RegistrationStatusQuery,
};
pub use reporting::{
    GetInactiveUsersHandler, GetInactiveUsersQuery, GetUserMetricsHandler, InactiveUser, UserMetrics,
};
pub use subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, ChangePlanCommand, ChangePlanHandler,
    ExtendSubscriptionCommand, ExtendSubscriptionHandler, GrantAdminAccessCommand,
    GrantAdminAccessHandler, GrantFreeAccessCommand, GrantFreeAccessHandler, LifecycleResult,
    ReactivateSubscriptionCommand, ReactivateSubscriptionHandler,
};
pub use webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
    WebhookDependencies, WebhookEventHandler,
};
