//! BeginRegistrationHandler - Command handler for starting a signup.
//!
//! A signup either waits for payment as a pending registration, or, when a
//! promo code prices the plan at zero, becomes a user with an active
//! subscription straight away.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::foundation::Timestamp;
use crate::domain::promo::{PriceQuote, Redemption};
use crate::domain::registration::{
    NewPendingRegistration, PendingRegistration, RegistrationError, RegistrationWindows,
};
use crate::domain::subscription::{CheckoutActivation, Plan, PlanPricing, Subscription};
use crate::domain::user::{Email, NewUser, User};
use crate::ports::{
    EmailSender, PendingRegistrationRepository, PromoCodeRepository, SubscriptionRepository,
    UserRepository,
};

use super::super::promo::{parse_code, quote_plan};
use super::super::support::sync_user_entitlement;

/// Command to start a registration.
#[derive(Debug, Clone)]
pub struct BeginRegistrationCommand {
    pub name: String,
    pub email: String,
    /// Already hashed by the auth layer.
    pub password_hash: String,
    pub promo_code: Option<String>,
    pub plan: Plan,
}

#[derive(Debug, Clone)]
pub enum BeginRegistrationResult {
    /// Held until checkout completes.
    PaymentRequired {
        pending: PendingRegistration,
        quote: PriceQuote,
    },
    /// Zero-priced; the account exists now.
    Registered {
        user: User,
        subscription: Subscription,
    },
}

pub struct BeginRegistrationHandler {
    users: Arc<dyn UserRepository>,
    pending_registrations: Arc<dyn PendingRegistrationRepository>,
    promo_codes: Arc<dyn PromoCodeRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    email_sender: Arc<dyn EmailSender>,
    pricing: PlanPricing,
    windows: RegistrationWindows,
}

impl BeginRegistrationHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserRepository>,
        pending_registrations: Arc<dyn PendingRegistrationRepository>,
        promo_codes: Arc<dyn PromoCodeRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        email_sender: Arc<dyn EmailSender>,
        pricing: PlanPricing,
        windows: RegistrationWindows,
    ) -> Self {
        Self {
            users,
            pending_registrations,
            promo_codes,
            subscriptions,
            email_sender,
            pricing,
            windows,
        }
    }

    pub async fn handle(
        &self,
        cmd: BeginRegistrationCommand,
    ) -> Result<BeginRegistrationResult, RegistrationError> {
        let now = Timestamp::now();

        // 1. Validate input
        let email = Email::parse(&cmd.email)?;
        if !cmd.plan.is_purchasable() {
            return Err(RegistrationError::PlanNotPurchasable(cmd.plan));
        }
        let code = parse_code(cmd.promo_code.as_deref())?;

        // 2. The email must not belong to a user or a live signup
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(RegistrationError::EmailInUse(email.to_string()));
        }
        if let Some(existing) = self.pending_registrations.find_by_email(&email).await? {
            if !existing.is_expired(now) {
                return Err(RegistrationError::EmailInUse(email.to_string()));
            }
            self.pending_registrations.delete(&existing.id).await?;
            debug!(pending_registration_id = %existing.id, "purged expired registration for reused email");
        }

        // 3. Price server-side
        let quote = quote_plan(
            self.promo_codes.as_ref(),
            &self.pricing,
            cmd.plan,
            code.as_ref(),
            None,
            now,
        )
        .await?;

        if quote.is_free() {
            return self
                .register_directly(cmd.name, email, cmd.password_hash, quote, now)
                .await;
        }

        // 4. Hold the signup until payment is confirmed
        let pending = PendingRegistration::create(
            NewPendingRegistration {
                name: cmd.name,
                email,
                password_hash: cmd.password_hash,
                promo_code: quote.promo_code.as_ref().map(|r| r.code.clone()),
                plan: cmd.plan,
            },
            &self.windows,
            now,
        )?;
        self.pending_registrations.insert(&pending, now).await?;

        info!(
            pending_registration_id = %pending.id,
            plan = %pending.plan,
            final_price = quote.final_price,
            "registration awaiting payment"
        );
        Ok(BeginRegistrationResult::PaymentRequired { pending, quote })
    }

    async fn register_directly(
        &self,
        name: String,
        email: Email,
        password_hash: String,
        quote: PriceQuote,
        now: Timestamp,
    ) -> Result<BeginRegistrationResult, RegistrationError> {
        let promo_code = quote.promo_code.as_ref().map(|r| r.code.clone());
        let user = User::register(
            NewUser {
                name,
                email,
                password_hash,
                is_verified: false,
                registration_promo_code: promo_code.clone(),
            },
            now,
        )?;

        // Redeem before anything is created; an exhausted code aborts the signup.
        if let Some(code_ref) = &quote.promo_code {
            self.promo_codes
                .redeem(&code_ref.id, Redemption::new(user.id, quote.breakdown(), now))
                .await?;
        }

        if let Err(err) = self.users.insert(&user).await {
            if let Some(code_ref) = &quote.promo_code {
                error!(
                    promo_code = %code_ref.code,
                    user_id = %user.id,
                    error = %err,
                    "promo code redeemed for a signup that could not be stored"
                );
            }
            return Err(err.into());
        }

        let mut subscription = Subscription::new_inactive(user.id, now);
        subscription.activate_from_checkout(
            CheckoutActivation {
                plan: quote.plan,
                breakdown: quote.breakdown(),
                external_customer_id: None,
                external_subscription_id: None,
                promo_code,
            },
            now,
        );
        if quote.promo_code.as_ref().is_some_and(|r| r.unlimited) {
            subscription.remove_expiry(now);
        }
        self.subscriptions.insert(&subscription).await?;

        let user = sync_user_entitlement(
            self.users.as_ref(),
            self.subscriptions.as_ref(),
            &user.id,
            now,
        )
        .await?
        .unwrap_or(user);

        let token = Uuid::new_v4().simple().to_string();
        if let Err(err) = self.email_sender.send_verification_email(&user, &token).await {
            warn!(user_id = %user.id, error = %err, "verification email failed");
        }

        info!(
            user_id = %user.id,
            plan = %subscription.plan,
            "registered without payment"
        );
        Ok(BeginRegistrationResult::Registered { user, subscription })
    }
}
