//! `invoice.payment_succeeded` and `invoice.payment_failed`: renewal charges
//! on the payment ledger.
//!
//! The invoice opened by checkout is already on the ledger as the checkout
//! payment and is not recorded again. A failed payment never changes the subscription status; the provider's
//! own subscription update does that.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::foundation::{PriceBreakdown, Timestamp};
use crate::domain::payment::{NewPayment, Payment, PaymentSource};
use crate::domain::subscription::Subscription;
use crate::domain::webhook::{
    EventType, ProviderEvent, ProviderEventKind, ProviderInvoice, WebhookError, WebhookOutcome,
};
use crate::ports::{PaymentRepository, SaveResult, SubscriptionRepository};

use super::{WebhookDependencies, WebhookEventHandler};

const EVENT_TYPES: &[EventType] = &[
    EventType::InvoicePaymentSucceeded,
    EventType::InvoicePaymentFailed,
];

pub struct InvoiceEventsHandler {
    deps: WebhookDependencies,
}

impl InvoiceEventsHandler {
    pub fn new(deps: WebhookDependencies) -> Self {
        Self { deps }
    }

    async fn succeeded(&self, invoice: &ProviderInvoice) -> Result<WebhookOutcome, WebhookError> {
        let Some(subscription) = self.locate(invoice).await? else {
            return Ok(WebhookOutcome::dropped(format!(
                "no subscription for invoice {}",
                invoice.invoice_id
            )));
        };

        // 1. First invoice belongs to the checkout payment
        if invoice.opened_by_checkout() {
            debug!(
                invoice_id = %invoice.invoice_id,
                user_id = %subscription.user_id,
                "first invoice covered by the checkout payment"
            );
            return Ok(WebhookOutcome::Duplicate);
        }

        // 2. Replays
        if self
            .deps
            .payments
            .find_by_external_charge_id(&invoice.invoice_id)
            .await?
            .is_some()
        {
            return Ok(WebhookOutcome::Duplicate);
        }

        // 3. Record the renewal at the subscription's price when it matches
        let discounted = invoice.amount_paid == subscription.amount;
        let breakdown = if discounted {
            subscription.breakdown()
        } else {
            PriceBreakdown::full_price(invoice.amount_paid)
        };
        let payment = Payment::succeeded(
            NewPayment {
                user_id: subscription.user_id,
                subscription_id: Some(subscription.id),
                external_charge_id: invoice.invoice_id.clone(),
                payment_intent_id: invoice.payment_intent_id.clone(),
                currency: self.currency(invoice),
                payment_method: None,
                source: PaymentSource::Invoice,
                promo_code: subscription.promo_code.clone().filter(|_| discounted),
                breakdown,
            },
            Timestamp::now(),
        );
        if self.deps.payments.insert(&payment).await? == SaveResult::AlreadyExists {
            return Ok(WebhookOutcome::Duplicate);
        }

        info!(
            user_id = %subscription.user_id,
            invoice_id = %invoice.invoice_id,
            amount = payment.amount,
            "renewal payment recorded"
        );
        Ok(WebhookOutcome::applied())
    }

    async fn failed(
        &self,
        event: &ProviderEvent,
        invoice: &ProviderInvoice,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(subscription) = self.locate(invoice).await? else {
            return Ok(WebhookOutcome::dropped(format!(
                "no subscription for invoice {}",
                invoice.invoice_id
            )));
        };

        // Keyed by event so a later successful retry of the same invoice
        // is still recorded under the invoice id.
        let payment = Payment::failed(
            NewPayment {
                user_id: subscription.user_id,
                subscription_id: Some(subscription.id),
                external_charge_id: event.id.clone(),
                payment_intent_id: invoice.payment_intent_id.clone(),
                currency: self.currency(invoice),
                payment_method: None,
                source: PaymentSource::Invoice,
                promo_code: None,
                breakdown: PriceBreakdown::full_price(invoice.amount_due),
            },
            Timestamp::now(),
        );
        if self.deps.payments.insert(&payment).await? == SaveResult::AlreadyExists {
            return Ok(WebhookOutcome::Duplicate);
        }

        warn!(
            user_id = %subscription.user_id,
            invoice_id = %invoice.invoice_id,
            amount_due = invoice.amount_due,
            "invoice payment failed"
        );
        Ok(WebhookOutcome::applied())
    }

    async fn locate(&self, invoice: &ProviderInvoice) -> Result<Option<Subscription>, WebhookError> {
        let subscriptions = &self.deps.subscriptions;
        if let Some(subscription_id) = &invoice.subscription_id {
            if let Some(sub) = subscriptions
                .find_by_external_subscription_id(subscription_id)
                .await?
            {
                return Ok(Some(sub));
            }
        }
        match &invoice.customer_id {
            Some(customer_id) => Ok(subscriptions.find_by_external_customer_id(customer_id).await?),
            None => Ok(None),
        }
    }

    fn currency(&self, invoice: &ProviderInvoice) -> String {
        if invoice.currency.is_empty() {
            self.deps.currency.clone()
        } else {
            invoice.currency.clone()
        }
    }
}

#[async_trait]
impl WebhookEventHandler for InvoiceEventsHandler {
    fn event_types(&self) -> &'static [EventType] {
        EVENT_TYPES
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        match &event.kind {
            ProviderEventKind::InvoicePaymentSucceeded(invoice) => self.succeeded(invoice).await,
            ProviderEventKind::InvoicePaymentFailed(invoice) => self.failed(event, invoice).await,
            other => Ok(WebhookOutcome::dropped(format!(
                "unexpected payload for {}",
                other.type_name()
            ))),
        }
    }
}
