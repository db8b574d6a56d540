//! Shared test wiring for handler tests: in-memory stores, the mock
//! provider and a recording email sender.

use std::sync::Arc;

use crate::adapters::email::RecordingEmailSender;
use crate::adapters::memory::{
    InMemoryAuditLog, InMemoryEntitlementReader, InMemoryPaymentRepository,
    InMemoryPendingRegistrationRepository, InMemoryPromoCodeRepository,
    InMemorySubscriptionRepository, InMemoryUserRepository,
};
use crate::adapters::stripe::MockPaymentProvider;
use crate::domain::foundation::Timestamp;
use crate::domain::registration::CheckoutMetadata;
use crate::domain::webhook::{CheckoutCompleted, ProviderEvent, ProviderEventKind};
use crate::domain::promo::{
    ApplicablePlans, DiscountType, NewPromoCode, PromoCode, PromoCodeName, PromoCodeType,
    DEFAULT_PRESETS,
};
use crate::domain::subscription::PlanPricing;
use crate::domain::user::{Email, NewUser, User};
use crate::ports::{PromoCodeRepository, UserRepository};

use super::webhook::WebhookDependencies;

pub(crate) fn user(email: &str) -> User {
    User::register(
        NewUser {
            name: "Test User".to_string(),
            email: Email::parse(email).unwrap(),
            password_hash: "$argon2id$test".to_string(),
            is_verified: true,
            registration_promo_code: None,
        },
        Timestamp::now(),
    )
    .unwrap()
}

pub(crate) fn custom_code(code: &str, discount_type: DiscountType, value: i64, max_uses: u32) -> PromoCode {
    PromoCode::create(
        NewPromoCode {
            code: PromoCodeName::try_new(code).unwrap(),
            code_type: PromoCodeType::Custom,
            discount_type,
            discount_value: value,
            final_price: None,
            max_uses,
            valid_from: Timestamp::now().add_days(-1),
            valid_until: None,
            applicable_plans: ApplicablePlans::Both,
            description: String::new(),
        },
        Timestamp::now(),
    )
    .unwrap()
}

pub(crate) fn friends_family() -> PromoCode {
    let now = Timestamp::now().add_days(-1);
    PromoCode::create(DEFAULT_PRESETS[0].to_new_promo_code(now).unwrap(), now).unwrap()
}

pub(crate) fn event(id: &str, kind: ProviderEventKind) -> ProviderEvent {
    ProviderEvent {
        id: id.to_string(),
        created: Timestamp::now(),
        livemode: false,
        kind,
    }
}

/// A paid `checkout.session.completed` payload for `metadata`.
pub(crate) fn paid_session(session_id: &str, metadata: &CheckoutMetadata) -> CheckoutCompleted {
    CheckoutCompleted {
        session_id: session_id.to_string(),
        customer_id: Some(format!("cus_{}", session_id)),
        subscription_id: Some(format!("sub_{}", session_id)),
        payment_intent_id: None,
        amount_total: Some(metadata.breakdown.final_amount()),
        currency: Some("usd".to_string()),
        payment_status: "paid".to_string(),
        metadata: metadata.to_map(),
    }
}

pub(crate) struct Stores {
    pub users: Arc<InMemoryUserRepository>,
    pub subscriptions: Arc<InMemorySubscriptionRepository>,
    pub pending: Arc<InMemoryPendingRegistrationRepository>,
    pub promo_codes: Arc<InMemoryPromoCodeRepository>,
    pub payments: Arc<InMemoryPaymentRepository>,
    pub audit: Arc<InMemoryAuditLog>,
    pub emails: Arc<RecordingEmailSender>,
    pub provider: MockPaymentProvider,
    pub pricing: PlanPricing,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
            pending: Arc::new(InMemoryPendingRegistrationRepository::new()),
            promo_codes: Arc::new(InMemoryPromoCodeRepository::new()),
            payments: Arc::new(InMemoryPaymentRepository::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            emails: Arc::new(RecordingEmailSender::new()),
            provider: MockPaymentProvider::new(),
            pricing: PlanPricing::default(),
        }
    }

    pub fn reader(&self) -> Arc<InMemoryEntitlementReader> {
        Arc::new(InMemoryEntitlementReader::new(
            self.users.clone(),
            self.subscriptions.clone(),
        ))
    }

    pub fn webhook_dependencies(&self) -> WebhookDependencies {
        WebhookDependencies {
            users: self.users.clone(),
            subscriptions: self.subscriptions.clone(),
            pending_registrations: self.pending.clone(),
            promo_codes: self.promo_codes.clone(),
            payments: self.payments.clone(),
            email_sender: self.emails.clone(),
            currency: "usd".to_string(),
        }
    }

    pub async fn add_user(&self, email: &str) -> User {
        let user = user(email);
        self.users.insert(&user).await.unwrap();
        user
    }

    pub async fn add_code(&self, code: PromoCode) -> PromoCode {
        self.promo_codes.insert(&code).await.unwrap();
        code
    }
}
