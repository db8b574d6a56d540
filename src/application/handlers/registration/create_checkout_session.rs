//! CreateCheckoutSessionHandler - Command handler for starting a hosted checkout.
//!
//! Works for a pending signup and for an existing user upgrading. The price
//! is always computed here; the provider is told the final amount and the
//! full purchase travels back in the session metadata.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::foundation::{PendingRegistrationId, Timestamp, UserId};
use crate::domain::promo::PriceQuote;
use crate::domain::registration::{CheckoutMetadata, PendingRegistration, RegistrationError};
use crate::domain::subscription::{Plan, PlanPricing};
use crate::domain::user::User;
use crate::ports::{
    BillingInterval, CheckoutMode, CheckoutSession, CreateCheckoutRequest, LineItem,
    PaymentProvider, PendingRegistrationRepository, PromoCodeRepository, UserRepository,
};

use super::super::promo::{parse_code, quote_plan};
use super::super::support::call_provider;

/// Who is paying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutFor {
    PendingRegistration(PendingRegistrationId),
    ExistingUser(UserId),
}

/// Command to create a checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionCommand {
    pub target: CheckoutFor,
    pub plan: Plan,
    /// Overrides the code captured at signup when given.
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionResult {
    pub session: CheckoutSession,
    pub quote: PriceQuote,
}

/// Prices, currency and redirect targets for checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub pricing: PlanPricing,
    pub currency: String,
    /// Must carry the provider's session id placeholder.
    pub success_url: String,
    pub cancel_url: String,
    pub provider_timeout: Duration,
}

impl CheckoutSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            pricing: config.payment.plan_pricing(),
            currency: config.payment.currency.clone(),
            success_url: config.registration.success_url_with_session(),
            cancel_url: config.registration.cancel_url.clone(),
            provider_timeout: config.payment.provider_timeout(),
        }
    }
}

enum Payer {
    Signup(PendingRegistration),
    User(User),
}

pub struct CreateCheckoutSessionHandler {
    users: Arc<dyn UserRepository>,
    pending_registrations: Arc<dyn PendingRegistrationRepository>,
    promo_codes: Arc<dyn PromoCodeRepository>,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
}

impl CreateCheckoutSessionHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        pending_registrations: Arc<dyn PendingRegistrationRepository>,
        promo_codes: Arc<dyn PromoCodeRepository>,
        provider: Arc<dyn PaymentProvider>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            users,
            pending_registrations,
            promo_codes,
            provider,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CreateCheckoutSessionResult, RegistrationError> {
        let now = Timestamp::now();

        // 1. Validate plan and code
        if !cmd.plan.is_purchasable() {
            return Err(RegistrationError::PlanNotPurchasable(cmd.plan));
        }
        let requested_code = parse_code(cmd.promo_code.as_deref())?;

        // 2. Resolve the payer
        let (payer, code) = match cmd.target {
            CheckoutFor::PendingRegistration(id) => {
                let record = self
                    .pending_registrations
                    .find_by_id(&id)
                    .await?
                    .ok_or(RegistrationError::PendingRegistrationNotFound(id))?;
                if record.is_expired(now) {
                    return Err(RegistrationError::RegistrationExpired(id));
                }
                let code = requested_code.or_else(|| record.promo_code.clone());
                (Payer::Signup(record), code)
            }
            CheckoutFor::ExistingUser(user_id) => {
                let user = self
                    .users
                    .find_by_id(&user_id)
                    .await?
                    .ok_or(RegistrationError::UserNotFound(user_id))?;
                (Payer::User(user), requested_code)
            }
        };

        // 3. Price server-side
        let user_id = match &payer {
            Payer::Signup(_) => None,
            Payer::User(user) => Some(user.id),
        };
        let quote = quote_plan(
            self.promo_codes.as_ref(),
            &self.settings.pricing,
            cmd.plan,
            code.as_ref(),
            user_id.as_ref(),
            now,
        )
        .await?;
        if quote.is_free() {
            return Err(RegistrationError::ZeroPriceRequiresDirectPath);
        }

        // 4. Build the request
        let (reference, customer_email, metadata) = match &payer {
            Payer::Signup(record) => (
                record.id.to_string(),
                record.email.to_string(),
                CheckoutMetadata::for_registration(record, &quote),
            ),
            Payer::User(user) => (
                user.id.to_string(),
                user.email.to_string(),
                CheckoutMetadata::for_existing_user(user.id, &quote),
            ),
        };
        let request = CreateCheckoutRequest {
            mode: CheckoutMode::Subscription,
            line_items: vec![LineItem {
                name: format!("{} plan", cmd.plan),
                unit_amount: quote.final_price,
                currency: self.settings.currency.clone(),
                quantity: 1,
                interval: Some(match cmd.plan {
                    Plan::Annual => BillingInterval::Year,
                    _ => BillingInterval::Month,
                }),
            }],
            customer_email: Some(customer_email),
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
            metadata: metadata.to_map(),
            idempotency_key: Some(format!("checkout-{}-{}", reference, now.as_unix_secs())),
        };

        // 5. Create the session
        let session = call_provider(
            self.settings.provider_timeout,
            "create_checkout_session",
            self.provider.create_checkout_session(request),
        )
        .await
        .map_err(|err| {
            warn!(payer = %reference, error = %err, "checkout session creation failed");
            RegistrationError::Provider(err.to_string())
        })?;

        // 6. Remember the session on the pending record
        if let Payer::Signup(mut record) = payer {
            record.start_checkout(session.id.clone(), now)?;
            self.pending_registrations.update(&record).await?;
        }

        info!(
            payer = %reference,
            session_id = %session.id,
            plan = %cmd.plan,
            final_price = quote.final_price,
            "checkout session created"
        );
        Ok(CreateCheckoutSessionResult { session, quote })
    }
}
