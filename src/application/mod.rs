//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers mutate promo codes, registrations and subscriptions;
//! query handlers answer entitlement and reporting questions.

pub mod handlers;

pub use handlers::{
    // Promo codes
    CreatePromoCodeCommand, CreatePromoCodeHandler, PricePlanHandler, PricePlanQuery,
    RedeemPromoCodeCommand, RedeemPromoCodeHandler, SeedPresetPromoCodesCommand,
    SeedPresetPromoCodesHandler, SeedPresetPromoCodesResult, UpdatePromoCodeCommand,
    UpdatePromoCodeHandler,
    // Registration and checkout
    BeginRegistrationCommand, BeginRegistrationHandler, BeginRegistrationResult, CheckoutFor,
    CheckoutSettings, CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
    CreateCheckoutSessionResult, PurgeExpiredRegistrationsCommand,
    PurgeExpiredRegistrationsHandler, PurgeExpiredRegistrationsResult, RegistrationStatusHandler,
    RegistrationStatusQuery,
    // Webhooks
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
    WebhookDependencies, WebhookEventHandler,
    // Subscription lifecycle
    CancelSubscriptionCommand, CancelSubscriptionHandler, ChangePlanCommand, ChangePlanHandler,
    ExtendSubscriptionCommand, ExtendSubscriptionHandler, GrantAdminAccessCommand,
    GrantAdminAccessHandler, GrantFreeAccessCommand, GrantFreeAccessHandler, LifecycleResult,
    ReactivateSubscriptionCommand, ReactivateSubscriptionHandler,
    // Entitlement and reporting
    CheckPremiumAccessHandler, CheckPremiumAccessQuery, CheckPremiumAccessResult,
    GetInactiveUsersHandler, GetInactiveUsersQuery, GetUserMetricsHandler, InactiveUser, UserMetrics,
};
