//! `charge.refunded`: appends the charge's refunds to the matching payment.

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::domain::payment::{Payment, PaymentSource, Refund, RefundOutcome};
use crate::domain::webhook::{
    EventType, ProviderCharge, ProviderEvent, ProviderEventKind, WebhookError, WebhookOutcome,
};
use crate::ports::{PaymentRepository, SubscriptionRepository};

use super::{WebhookDependencies, WebhookEventHandler};

pub struct ChargeRefundedHandler {
    deps: WebhookDependencies,
}

impl ChargeRefundedHandler {
    pub fn new(deps: WebhookDependencies) -> Self {
        Self { deps }
    }

    /// Payment intent first; the invoice or charge id covers payments
    /// recorded before their intent was known.
    async fn locate(&self, charge: &ProviderCharge) -> Result<Option<Payment>, WebhookError> {
        let payments = &self.deps.payments;
        if let Some(intent) = &charge.payment_intent_id {
            if let Some(payment) = payments.find_by_payment_intent_id(intent).await? {
                return Ok(Some(payment));
            }
        }
        if let Some(invoice_id) = &charge.invoice_id {
            if let Some(payment) = payments.find_by_external_charge_id(invoice_id).await? {
                return Ok(Some(payment));
            }
        }
        if let Some(payment) = payments.find_by_external_charge_id(&charge.charge_id).await? {
            return Ok(Some(payment));
        }
        self.checkout_payment_for(charge).await
    }

    /// The charge of a subscription's first invoice is on the ledger as the
    /// checkout payment, keyed by session id. Matched through the customer's
    /// subscription and the charged amount.
    async fn checkout_payment_for(&self, charge: &ProviderCharge) -> Result<Option<Payment>, WebhookError> {
        let (Some(_), Some(customer_id)) = (&charge.invoice_id, &charge.customer_id) else {
            return Ok(None);
        };
        let Some(subscription) = self
            .deps
            .subscriptions
            .find_by_external_customer_id(customer_id)
            .await?
        else {
            return Ok(None);
        };

        let payment = self
            .deps
            .payments
            .list_for_user(&subscription.user_id)
            .await?
            .into_iter()
            .find(|p| {
                p.source == PaymentSource::Checkout
                    && p.subscription_id == Some(subscription.id)
                    && p.amount == charge.amount
            });
        if let Some(payment) = &payment {
            debug!(
                payment_id = %payment.id,
                charge_id = %charge.charge_id,
                "refund matched to checkout payment through subscription"
            );
        }
        Ok(payment)
    }

    async fn refund(&self, charge: &ProviderCharge) -> Result<WebhookOutcome, WebhookError> {
        let Some(mut payment) = self.locate(charge).await? else {
            return Ok(WebhookOutcome::dropped(format!(
                "no payment for charge {}",
                charge.charge_id
            )));
        };

        let mut applied = 0;
        for refund in &charge.refunds {
            let outcome = payment.add_refund(Refund {
                external_refund_id: refund.refund_id.clone(),
                amount: refund.amount,
                created_at: refund.created,
            });
            match outcome {
                Ok(RefundOutcome::Applied) => applied += 1,
                Ok(RefundOutcome::AlreadyRecorded) => {}
                Err(err) => {
                    error!(
                        payment_id = %payment.id,
                        refund_id = %refund.refund_id,
                        error = %err,
                        "refund does not fit the payment ledger"
                    );
                    return Ok(WebhookOutcome::dropped(err.to_string()));
                }
            }
        }
        if applied == 0 {
            return Ok(WebhookOutcome::Duplicate);
        }

        self.deps.payments.update(&payment).await?;
        info!(
            payment_id = %payment.id,
            user_id = %payment.user_id,
            refunds = applied,
            net_amount = payment.net_amount(),
            status = payment.status.as_str(),
            "refund recorded"
        );
        Ok(WebhookOutcome::applied())
    }
}

#[async_trait]
impl WebhookEventHandler for ChargeRefundedHandler {
    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ChargeRefunded]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        match &event.kind {
            ProviderEventKind::ChargeRefunded(charge) => self.refund(charge).await,
            other => Ok(WebhookOutcome::dropped(format!(
                "unexpected payload for {}",
                other.type_name()
            ))),
        }
    }
}
