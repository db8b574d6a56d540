//! Shared wiring for integration tests: every handler built over the
//! in-memory adapters and a signing mock payment provider.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use entitlement_engine::adapters::{
    InMemoryAuditLog, InMemoryEntitlementReader, InMemoryPaymentRepository,
    InMemoryPendingRegistrationRepository, InMemoryPromoCodeRepository,
    InMemorySubscriptionRepository, InMemoryUserRepository, MockPaymentProvider,
    RecordingEmailSender,
};
use entitlement_engine::application::{
    BeginRegistrationHandler, CancelSubscriptionHandler, CheckPremiumAccessHandler,
    CheckoutSettings, CreateCheckoutSessionHandler, GrantAdminAccessHandler,
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
    PricePlanHandler, RedeemPromoCodeHandler, RegistrationStatusHandler,
    SeedPresetPromoCodesCommand, SeedPresetPromoCodesHandler, WebhookDependencies,
};
use entitlement_engine::domain::foundation::Timestamp;
use entitlement_engine::domain::promo::DEFAULT_PRESETS;
use entitlement_engine::domain::registration::RegistrationWindows;
use entitlement_engine::domain::subscription::PlanPricing;
use entitlement_engine::domain::webhook::{sign_payload, WebhookError};

pub const WEBHOOK_SECRET: &str = "whsec_integration";

pub struct Engine {
    pub users: Arc<InMemoryUserRepository>,
    pub subscriptions: Arc<InMemorySubscriptionRepository>,
    pub pending: Arc<InMemoryPendingRegistrationRepository>,
    pub promo_codes: Arc<InMemoryPromoCodeRepository>,
    pub payments: Arc<InMemoryPaymentRepository>,
    pub audit: Arc<InMemoryAuditLog>,
    pub emails: Arc<RecordingEmailSender>,
    pub provider: MockPaymentProvider,
    pub pricing: PlanPricing,
    pub windows: RegistrationWindows,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
            pending: Arc::new(InMemoryPendingRegistrationRepository::new()),
            promo_codes: Arc::new(InMemoryPromoCodeRepository::new()),
            payments: Arc::new(InMemoryPaymentRepository::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            emails: Arc::new(RecordingEmailSender::new()),
            provider: MockPaymentProvider::with_webhook_secret(WEBHOOK_SECRET),
            pricing: PlanPricing::default(),
            windows: RegistrationWindows::default(),
        }
    }

    /// Seeds the preset codes, including FRIENDSFAMILY.
    pub async fn with_presets() -> Self {
        let engine = Self::new();
        SeedPresetPromoCodesHandler::new(engine.promo_codes.clone())
            .handle(SeedPresetPromoCodesCommand {
                presets: DEFAULT_PRESETS.to_vec(),
            })
            .await
            .expect("presets seed");
        engine
    }

    pub fn price_plan(&self) -> PricePlanHandler {
        PricePlanHandler::new(self.promo_codes.clone(), self.pricing)
    }

    pub fn redeem(&self) -> RedeemPromoCodeHandler {
        RedeemPromoCodeHandler::new(self.promo_codes.clone())
    }

    pub fn begin_registration(&self) -> BeginRegistrationHandler {
        BeginRegistrationHandler::new(
            self.users.clone(),
            self.pending.clone(),
            self.promo_codes.clone(),
            self.subscriptions.clone(),
            self.emails.clone(),
            self.pricing,
            self.windows,
        )
    }

    pub fn checkout(&self) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(
            self.users.clone(),
            self.pending.clone(),
            self.promo_codes.clone(),
            Arc::new(self.provider.clone()),
            CheckoutSettings {
                pricing: self.pricing,
                currency: "usd".to_string(),
                success_url: "https://app.example.com/welcome?session_id={CHECKOUT_SESSION_ID}"
                    .to_string(),
                cancel_url: "https://app.example.com/signup".to_string(),
                provider_timeout: Duration::from_secs(5),
            },
        )
    }

    pub fn registration_status(&self) -> RegistrationStatusHandler {
        RegistrationStatusHandler::new(
            self.users.clone(),
            self.pending.clone(),
            Arc::new(self.provider.clone()),
            self.windows,
            Duration::from_secs(5),
        )
    }

    pub fn webhooks(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::with_default_handlers(
            Arc::new(self.provider.clone()),
            WebhookDependencies {
                users: self.users.clone(),
                subscriptions: self.subscriptions.clone(),
                pending_registrations: self.pending.clone(),
                promo_codes: self.promo_codes.clone(),
                payments: self.payments.clone(),
                email_sender: self.emails.clone(),
                currency: "usd".to_string(),
            },
        )
    }

    pub fn grant_admin(&self) -> GrantAdminAccessHandler {
        GrantAdminAccessHandler::new(
            self.users.clone(),
            self.subscriptions.clone(),
            self.audit.clone(),
        )
    }

    pub fn cancel(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.users.clone(),
            self.subscriptions.clone(),
            self.audit.clone(),
            Arc::new(self.provider.clone()),
            Duration::from_secs(5),
        )
    }

    pub fn check_access(&self) -> CheckPremiumAccessHandler {
        CheckPremiumAccessHandler::new(self.users.clone(), self.subscriptions.clone())
    }

    pub fn reader(&self) -> Arc<InMemoryEntitlementReader> {
        Arc::new(InMemoryEntitlementReader::new(
            self.users.clone(),
            self.subscriptions.clone(),
        ))
    }

    /// Signs `event` as the provider would and runs it through the processor.
    pub async fn deliver(
        &self,
        event: &serde_json::Value,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        let payload = serde_json::to_vec(event).expect("event serializes");
        let signature = sign_payload(WEBHOOK_SECRET, Timestamp::now().as_unix_secs(), &payload)?;
        self.webhooks()
            .handle(HandlePaymentWebhookCommand { payload, signature })
            .await
    }
}

/// A provider event envelope.
pub fn envelope(id: &str, event_type: &str, created: i64, object: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "type": event_type,
        "created": created,
        "livemode": false,
        "data": { "object": object }
    })
}
