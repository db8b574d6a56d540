//! `checkout.session.completed`: turns a paid checkout into an account with
//! an active subscription.
//!
//! The purchase is rebuilt from the session metadata alone, so the pending
//! registration may already be gone when the event lands.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::domain::foundation::{ErrorCode, PriceBreakdown, Timestamp, UserId};
use crate::domain::payment::{NewPayment, Payment, PaymentSource};
use crate::domain::promo::{PromoCodeError, PromoCodeName, Redemption};
use crate::domain::registration::{CheckoutMetadata, CheckoutSubject};
use crate::domain::subscription::{CheckoutActivation, ProviderSync};
use crate::domain::user::{NewUser, User};
use crate::domain::webhook::{
    CheckoutCompleted, EventType, ProviderEvent, ProviderEventKind, WebhookError, WebhookOutcome,
};
use crate::ports::{
    EmailSender, PaymentRepository, PendingRegistrationRepository, PromoCodeRepository, SaveResult,
    SubscriptionRepository, UserRepository,
};

use super::super::support::{sync_user_entitlement, upsert_subscription, Mutation};
use super::{WebhookDependencies, WebhookEventHandler};

pub struct CheckoutCompletedHandler {
    deps: WebhookDependencies,
}

enum Payer {
    Existing(User),
    Created(User),
    Missing(String),
}

impl CheckoutCompletedHandler {
    pub fn new(deps: WebhookDependencies) -> Self {
        Self { deps }
    }

    async fn complete(
        &self,
        event: &ProviderEvent,
        session: &CheckoutCompleted,
    ) -> Result<WebhookOutcome, WebhookError> {
        let now = Timestamp::now();

        // 1. Only a paid session grants anything
        if !session.is_paid() {
            return Ok(WebhookOutcome::dropped(format!(
                "session {} has payment status '{}'",
                session.session_id, session.payment_status
            )));
        }

        // 2. Already recorded
        if self
            .deps
            .payments
            .find_by_external_charge_id(&session.session_id)
            .await?
            .is_some()
        {
            debug!(session_id = %session.session_id, "checkout already recorded");
            return Ok(WebhookOutcome::Duplicate);
        }

        // 3. Rebuild the purchase
        let metadata = match CheckoutMetadata::from_map(&session.metadata) {
            Ok(metadata) => metadata,
            Err(err) => return Ok(WebhookOutcome::dropped(err.to_string())),
        };

        // 4. Find or create the user
        let (user, created) = match self.resolve_payer(&metadata, now).await? {
            Payer::Existing(user) => (user, false),
            Payer::Created(user) => (user, true),
            Payer::Missing(reason) => return Ok(WebhookOutcome::dropped(reason)),
        };

        // 5. Activate
        let activation = CheckoutActivation {
            plan: metadata.plan,
            breakdown: metadata.breakdown,
            external_customer_id: session.customer_id.clone(),
            external_subscription_id: session.subscription_id.clone(),
            promo_code: metadata.promo_code.clone(),
        };
        let mutated = upsert_subscription(self.deps.subscriptions.as_ref(), user.id, now, |sub| {
            let before = sub.clone();
            Ok::<_, WebhookError>(match sub.apply_checkout(activation.clone(), event.created, now) {
                ProviderSync::Applied => Mutation::Write(ProviderSync::Applied),
                ProviderSync::Stale if *sub != before => Mutation::Write(ProviderSync::Stale),
                sync => Mutation::Skip(sync),
            })
        })
        .await?;
        match mutated.value {
            ProviderSync::AdminOverride => {
                info!(user_id = %user.id, "admin access kept over checkout activation")
            }
            ProviderSync::Stale => info!(
                user_id = %user.id,
                session_id = %session.session_id,
                "checkout older than provider state; status kept"
            ),
            ProviderSync::Applied => {}
        }

        // 6. Redeem the promo code
        let promo_redemption_failed = match &metadata.promo_code {
            Some(code) => !self.redeem(code, user.id, metadata.breakdown, now).await?,
            None => false,
        };

        // 7. Record the payment
        if let Some(total) = session.amount_total {
            if total != metadata.breakdown.final_amount() {
                warn!(
                    session_id = %session.session_id,
                    amount_total = total,
                    final_amount = metadata.breakdown.final_amount(),
                    "provider total differs from quoted price"
                );
            }
        }
        let payment = Payment::succeeded(
            NewPayment {
                user_id: user.id,
                subscription_id: Some(mutated.subscription.id),
                external_charge_id: session.session_id.clone(),
                payment_intent_id: session.payment_intent_id.clone(),
                currency: session.currency.clone().unwrap_or_else(|| self.deps.currency.clone()),
                payment_method: Some("card".to_string()),
                source: PaymentSource::Checkout,
                promo_code: metadata.promo_code.clone(),
                breakdown: metadata.breakdown,
            },
            now,
        );
        if self.deps.payments.insert(&payment).await? == SaveResult::AlreadyExists {
            debug!(session_id = %session.session_id, "checkout recorded concurrently");
            return Ok(WebhookOutcome::Duplicate);
        }

        // 8. The pending registration has served its purpose
        if let CheckoutSubject::Registration {
            pending_registration_id,
            ..
        } = &metadata.subject
        {
            self.deps
                .pending_registrations
                .delete(pending_registration_id)
                .await?;
        }

        // 9. Refresh the cached entitlement
        let user = sync_user_entitlement(
            self.deps.users.as_ref(),
            self.deps.subscriptions.as_ref(),
            &user.id,
            now,
        )
        .await?
        .unwrap_or(user);

        if created {
            if let Err(err) = self.deps.email_sender.send_welcome_email(&user).await {
                warn!(user_id = %user.id, error = %err, "welcome email failed");
            }
        }

        info!(
            event_id = %event.id,
            user_id = %user.id,
            plan = %metadata.plan,
            amount = metadata.breakdown.final_amount(),
            new_user = created,
            "checkout completed"
        );
        Ok(WebhookOutcome::Applied {
            promo_redemption_failed,
        })
    }

    async fn resolve_payer(
        &self,
        metadata: &CheckoutMetadata,
        now: Timestamp,
    ) -> Result<Payer, WebhookError> {
        match &metadata.subject {
            CheckoutSubject::ExistingUser { user_id } => {
                Ok(match self.deps.users.find_by_id(user_id).await? {
                    Some(user) => Payer::Existing(user),
                    None => Payer::Missing(format!("user {} not found", user_id)),
                })
            }
            CheckoutSubject::Registration {
                name,
                email,
                password_hash,
                ..
            } => {
                if let Some(user) = self.deps.users.find_by_email(email).await? {
                    return Ok(Payer::Existing(user));
                }
                let user = match User::register(
                    NewUser {
                        name: name.clone(),
                        email: email.clone(),
                        password_hash: password_hash.clone(),
                        is_verified: true,
                        registration_promo_code: metadata.promo_code.clone(),
                    },
                    now,
                ) {
                    Ok(user) => user,
                    Err(err) => return Ok(Payer::Missing(err.to_string())),
                };

                match self.deps.users.insert(&user).await {
                    Ok(()) => Ok(Payer::Created(user)),
                    Err(err) if err.code == ErrorCode::EmailInUse => {
                        debug!(email = %email, "user created concurrently");
                        Ok(match self.deps.users.find_by_email(email).await? {
                            Some(user) => Payer::Existing(user),
                            None => Payer::Missing(format!("user {} vanished", email)),
                        })
                    }
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// Returns `false` when the ledger refused the redemption.
    async fn redeem(
        &self,
        code: &PromoCodeName,
        user_id: UserId,
        breakdown: PriceBreakdown,
        now: Timestamp,
    ) -> Result<bool, WebhookError> {
        let Some(promo) = self.deps.promo_codes.find_by_code(code).await? else {
            error!(promo_code = %code, user_id = %user_id, "paid checkout names an unknown promo code");
            return Ok(false);
        };

        match self
            .deps
            .promo_codes
            .redeem(&promo.id, Redemption::new(user_id, breakdown, now))
            .await
        {
            Ok(updated) => {
                debug!(
                    promo_code = %code,
                    current_uses = updated.current_uses,
                    max_uses = updated.max_uses,
                    "promo code redeemed at checkout"
                );
                Ok(true)
            }
            // Redelivery after a partial failure.
            Err(PromoCodeError::AlreadyUsedByUser { .. }) => {
                debug!(promo_code = %code, user_id = %user_id, "promo code already redeemed");
                Ok(true)
            }
            Err(PromoCodeError::Infrastructure(msg)) => Err(WebhookError::Infrastructure(msg)),
            Err(err) => {
                error!(
                    promo_code = %code,
                    user_id = %user_id,
                    error = %err,
                    "promo redemption failed after payment; manual grant needed"
                );
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl WebhookEventHandler for CheckoutCompletedHandler {
    fn event_types(&self) -> &'static [EventType] {
        &[EventType::CheckoutSessionCompleted]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        match &event.kind {
            ProviderEventKind::CheckoutCompleted(session) => self.complete(event, session).await,
            other => Ok(WebhookOutcome::dropped(format!(
                "unexpected payload for {}",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::email::EmailKind;
    use crate::application::handlers::fixtures::{self, Stores};
    use crate::domain::promo::{DiscountType, PriceQuote};
    use crate::domain::registration::{NewPendingRegistration, PendingRegistration, RegistrationWindows};
    use crate::domain::subscription::{Plan, Subscription, SubscriptionStatus};
    use crate::domain::user::Email;

    async fn pending(stores: &Stores, promo_code: Option<PromoCodeName>) -> PendingRegistration {
        let record = PendingRegistration::create(
            NewPendingRegistration {
                name: "Grace".to_string(),
                email: Email::parse("grace@example.com").unwrap(),
                password_hash: "hash".to_string(),
                promo_code,
                plan: Plan::Monthly,
            },
            &RegistrationWindows::default(),
            Timestamp::now(),
        )
        .unwrap();
        stores.pending.insert(&record, Timestamp::now()).await.unwrap();
        record
    }

    fn quote(code: Option<&crate::domain::promo::PromoCode>, breakdown: PriceBreakdown) -> PriceQuote {
        PriceQuote::from_breakdown(Plan::Monthly, breakdown, code.map(|c| c.reference()))
    }

    fn checkout_event(id: &str, session: CheckoutCompleted) -> ProviderEvent {
        fixtures::event(id, ProviderEventKind::CheckoutCompleted(session))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Registration checkout
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn paid_registration_creates_active_user() {
        let stores = Stores::new();
        let record = pending(&stores, None).await;
        let metadata = CheckoutMetadata::for_registration(&record, &quote(None, PriceBreakdown::full_price(3900)));
        let handler = CheckoutCompletedHandler::new(stores.webhook_dependencies());

        let outcome = handler
            .handle(&checkout_event("evt_1", fixtures::paid_session("cs_1", &metadata)))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::applied());
        let user = stores
            .users
            .find_by_email(&Email::parse("grace@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(user.is_verified);
        assert!(user.has_active_subscription);
        let sub = stores.subscriptions.find_by_user_id(&user.id).await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.amount, 3900);
        assert_eq!(sub.external_subscription_id.as_deref(), Some("sub_cs_1"));
        assert_eq!(stores.pending.len().await, 0);
        assert_eq!(stores.emails.sent_to(&user.id).await, vec![EmailKind::Welcome]);
    }

    #[tokio::test]
    async fn replayed_event_is_duplicate() {
        let stores = Stores::new();
        let record = pending(&stores, None).await;
        let metadata = CheckoutMetadata::for_registration(&record, &quote(None, PriceBreakdown::full_price(3900)));
        let handler = CheckoutCompletedHandler::new(stores.webhook_dependencies());
        let event = checkout_event("evt_1", fixtures::paid_session("cs_1", &metadata));

        handler.handle(&event).await.unwrap();
        let replay = handler.handle(&event).await.unwrap();

        assert_eq!(replay, WebhookOutcome::Duplicate);
        assert_eq!(stores.payments.count().await, 1);
        assert_eq!(stores.users.all().await.len(), 1);
    }

    #[tokio::test]
    async fn promo_code_is_redeemed_and_recorded() {
        let stores = Stores::new();
        let code = stores.add_code(fixtures::friends_family()).await;
        let record = pending(&stores, Some(code.code.clone())).await;
        let metadata = CheckoutMetadata::for_registration(
            &record,
            &quote(Some(&code), PriceBreakdown::with_discount(3900, 2400)),
        );
        let handler = CheckoutCompletedHandler::new(stores.webhook_dependencies());

        let outcome = handler
            .handle(&checkout_event("evt_1", fixtures::paid_session("cs_ff", &metadata)))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::applied());
        let stored = stores.promo_codes.find_by_id(&code.id).await.unwrap().unwrap();
        assert_eq!(stored.current_uses, 1);
        let payment = stores.payments.find_by_external_charge_id("cs_ff").await.unwrap().unwrap();
        assert_eq!(payment.amount, 1500);
        assert_eq!(payment.discount_amount, 2400);
        assert_eq!(payment.promo_code, Some(code.code));
    }

    #[tokio::test]
    async fn exhausted_code_still_activates_and_flags() {
        let stores = Stores::new();
        let code = stores
            .add_code(fixtures::custom_code("SOLO", DiscountType::FixedAmount, 900, 1))
            .await;
        stores
            .promo_codes
            .redeem(&code.id, Redemption::new(UserId::new(), PriceBreakdown::with_discount(3900, 900), Timestamp::now()))
            .await
            .unwrap();
        let record = pending(&stores, Some(code.code.clone())).await;
        let metadata = CheckoutMetadata::for_registration(
            &record,
            &quote(Some(&code), PriceBreakdown::with_discount(3900, 900)),
        );
        let handler = CheckoutCompletedHandler::new(stores.webhook_dependencies());

        let outcome = handler
            .handle(&checkout_event("evt_1", fixtures::paid_session("cs_late", &metadata)))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Applied { promo_redemption_failed: true });
        let user = stores.users.all().await.pop().unwrap();
        assert!(user.has_active_subscription);
    }

    #[tokio::test]
    async fn unpaid_session_is_dropped() {
        let stores = Stores::new();
        let record = pending(&stores, None).await;
        let metadata = CheckoutMetadata::for_registration(&record, &quote(None, PriceBreakdown::full_price(3900)));
        let mut session = fixtures::paid_session("cs_unpaid", &metadata);
        session.payment_status = "unpaid".to_string();
        let handler = CheckoutCompletedHandler::new(stores.webhook_dependencies());

        let outcome = handler.handle(&checkout_event("evt_1", session)).await.unwrap();

        assert!(matches!(outcome, WebhookOutcome::Dropped { .. }));
        assert!(stores.users.all().await.is_empty());
    }

    #[tokio::test]
    async fn missing_metadata_is_dropped() {
        let stores = Stores::new();
        let record = pending(&stores, None).await;
        let metadata = CheckoutMetadata::for_registration(&record, &quote(None, PriceBreakdown::full_price(3900)));
        let mut session = fixtures::paid_session("cs_bare", &metadata);
        session.metadata.clear();
        let handler = CheckoutCompletedHandler::new(stores.webhook_dependencies());

        let outcome = handler.handle(&checkout_event("evt_1", session)).await.unwrap();

        assert!(matches!(outcome, WebhookOutcome::Dropped { .. }));
        assert_eq!(stores.payments.count().await, 0);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Existing user checkout
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn upgrade_activates_existing_user_without_welcome() {
        let stores = Stores::new();
        let user = stores.add_user("ada@example.com").await;
        let metadata = CheckoutMetadata::for_existing_user(
            user.id,
            &PriceQuote::list_price(Plan::Annual, 39000),
        );
        let handler = CheckoutCompletedHandler::new(stores.webhook_dependencies());

        let outcome = handler
            .handle(&checkout_event("evt_1", fixtures::paid_session("cs_up", &metadata)))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::applied());
        let sub = stores.subscriptions.find_by_user_id(&user.id).await.unwrap().unwrap();
        assert_eq!(sub.plan, Plan::Annual);
        assert!(stores.emails.sent_to(&user.id).await.is_empty());
    }

    #[tokio::test]
    async fn upgrade_for_unknown_user_is_dropped() {
        let stores = Stores::new();
        let metadata = CheckoutMetadata::for_existing_user(
            UserId::new(),
            &PriceQuote::list_price(Plan::Monthly, 3900),
        );
        let handler = CheckoutCompletedHandler::new(stores.webhook_dependencies());

        let outcome = handler
            .handle(&checkout_event("evt_1", fixtures::paid_session("cs_ghost", &metadata)))
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::Dropped { .. }));
    }

    #[tokio::test]
    async fn admin_access_survives_checkout() {
        let stores = Stores::new();
        let user = stores.add_user("root@example.com").await;
        let mut sub = Subscription::new_inactive(user.id, Timestamp::now());
        sub.grant_admin_access(Timestamp::now());
        stores.subscriptions.insert(&sub).await.unwrap();
        let metadata = CheckoutMetadata::for_existing_user(
            user.id,
            &PriceQuote::list_price(Plan::Monthly, 3900),
        );
        let handler = CheckoutCompletedHandler::new(stores.webhook_dependencies());

        handler
            .handle(&checkout_event("evt_1", fixtures::paid_session("cs_admin", &metadata)))
            .await
            .unwrap();

        let stored = stores.subscriptions.find_by_user_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::AdminAccess);
        assert_eq!(stores.payments.count().await, 1);
    }
}
