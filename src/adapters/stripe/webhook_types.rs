//! Stripe wire types for webhook payloads and API responses.
//!
//! These types parse Stripe JSON as it arrives and convert it into the
//! provider-neutral events in `domain::webhook`. Fields the engine does not
//! use are left out; serde ignores them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::Timestamp;
use crate::domain::webhook::{
    CheckoutCompleted, EventType, ProviderCharge, ProviderEvent, ProviderEventKind,
    ProviderInvoice, ProviderRefund, ProviderSubscription, WebhookError,
};

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    /// Hosted checkout page. Present while the session is open.
    pub url: Option<String>,

    pub customer: Option<String>,

    pub customer_email: Option<String>,

    pub subscription: Option<String>,

    pub payment_intent: Option<String>,

    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,

    /// `open`, `complete` or `expired`.
    pub status: Option<String>,

    pub amount_total: Option<i64>,

    pub currency: Option<String>,

    /// Unix timestamp after which the session can no longer be paid.
    pub expires_at: Option<i64>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    pub customer: Option<String>,

    pub status: String,

    pub current_period_start: i64,

    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    pub customer: Option<String>,

    pub subscription: Option<String>,

    pub payment_intent: Option<String>,

    #[serde(default)]
    pub amount_paid: i64,

    #[serde(default)]
    pub amount_due: i64,

    pub currency: String,

    /// Why the invoice was created (`subscription_create`, `subscription_cycle`, ...).
    pub billing_reason: Option<String>,
}

/// Stripe Charge object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCharge {
    /// Unique charge identifier (ch_...).
    pub id: String,

    pub payment_intent: Option<String>,

    pub invoice: Option<String>,

    pub customer: Option<String>,

    pub amount: i64,

    #[serde(default)]
    pub refunds: StripeRefundList,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeRefundList {
    #[serde(default)]
    pub data: Vec<StripeRefund>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeRefund {
    /// Unique refund identifier (re_...).
    pub id: String,

    pub amount: i64,

    pub created: i64,
}

// ════════════════════════════════════════════════════════════════════════════════
// Conversion to provider-neutral events
// ════════════════════════════════════════════════════════════════════════════════

fn timestamp(field: &str, secs: i64) -> Result<Timestamp, String> {
    Timestamp::from_unix_secs(secs).ok_or_else(|| format!("{} is out of range: {}", field, secs))
}

impl From<StripeCheckoutSession> for CheckoutCompleted {
    fn from(session: StripeCheckoutSession) -> Self {
        CheckoutCompleted {
            session_id: session.id,
            customer_id: session.customer,
            subscription_id: session.subscription,
            payment_intent_id: session.payment_intent,
            amount_total: session.amount_total,
            currency: session.currency,
            payment_status: session.payment_status,
            metadata: session.metadata,
        }
    }
}

impl TryFrom<StripeSubscription> for ProviderSubscription {
    type Error = String;

    fn try_from(sub: StripeSubscription) -> Result<Self, Self::Error> {
        let current_period_end = sub
            .current_period_end
            .map(|secs| timestamp("current_period_end", secs))
            .transpose()?;
        Ok(ProviderSubscription {
            current_period_start: timestamp("current_period_start", sub.current_period_start)?,
            current_period_end,
            subscription_id: sub.id,
            customer_id: sub.customer,
            status: sub.status,
            cancel_at_period_end: sub.cancel_at_period_end,
            metadata: sub.metadata,
        })
    }
}

impl From<StripeInvoice> for ProviderInvoice {
    fn from(invoice: StripeInvoice) -> Self {
        ProviderInvoice {
            invoice_id: invoice.id,
            subscription_id: invoice.subscription,
            customer_id: invoice.customer,
            payment_intent_id: invoice.payment_intent,
            amount_paid: invoice.amount_paid,
            amount_due: invoice.amount_due,
            currency: invoice.currency,
            billing_reason: invoice.billing_reason,
        }
    }
}

impl TryFrom<StripeCharge> for ProviderCharge {
    type Error = String;

    fn try_from(charge: StripeCharge) -> Result<Self, Self::Error> {
        let refunds = charge
            .refunds
            .data
            .into_iter()
            .map(|r| {
                Ok(ProviderRefund {
                    created: timestamp("refund.created", r.created)?,
                    refund_id: r.id,
                    amount: r.amount,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(ProviderCharge {
            charge_id: charge.id,
            payment_intent_id: charge.payment_intent,
            invoice_id: charge.invoice,
            customer_id: charge.customer,
            amount: charge.amount,
            refunds,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(object: serde_json::Value) -> Result<T, String> {
    serde_json::from_value(object).map_err(|e| e.to_string())
}

fn decode_kind(event_type: EventType, object: serde_json::Value) -> Result<ProviderEventKind, String> {
    let kind = match event_type {
        EventType::CheckoutSessionCompleted => {
            ProviderEventKind::CheckoutCompleted(decode::<StripeCheckoutSession>(object)?.into())
        }
        EventType::SubscriptionCreated => {
            ProviderEventKind::SubscriptionCreated(decode::<StripeSubscription>(object)?.try_into()?)
        }
        EventType::SubscriptionUpdated => {
            ProviderEventKind::SubscriptionUpdated(decode::<StripeSubscription>(object)?.try_into()?)
        }
        EventType::SubscriptionDeleted => {
            ProviderEventKind::SubscriptionDeleted(decode::<StripeSubscription>(object)?.try_into()?)
        }
        EventType::InvoicePaymentSucceeded => {
            ProviderEventKind::InvoicePaymentSucceeded(decode::<StripeInvoice>(object)?.into())
        }
        EventType::InvoicePaymentFailed => {
            ProviderEventKind::InvoicePaymentFailed(decode::<StripeInvoice>(object)?.into())
        }
        EventType::ChargeRefunded => {
            ProviderEventKind::ChargeRefunded(decode::<StripeCharge>(object)?.try_into()?)
        }
    };
    Ok(kind)
}

/// Parses a Stripe event body (signature already checked).
///
/// A broken envelope is an error. A known event type whose object does not
/// decode becomes `ProviderEventKind::Malformed` so the processor can
/// acknowledge and drop it instead of triggering redelivery.
pub fn parse_event(payload: &[u8]) -> Result<ProviderEvent, WebhookError> {
    let envelope: StripeWebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::ParseError(format!("invalid event JSON: {}", e)))?;
    let created = Timestamp::from_unix_secs(envelope.created)
        .ok_or_else(|| WebhookError::ParseError(format!("invalid created: {}", envelope.created)))?;

    let kind = match EventType::from_wire(&envelope.event_type) {
        None => ProviderEventKind::Unknown {
            event_type: envelope.event_type,
        },
        Some(event_type) => decode_kind(event_type, envelope.data.object).unwrap_or_else(|reason| {
            tracing::warn!(
                event_id = %envelope.id,
                event_type = %event_type,
                reason = %reason,
                "Webhook object could not be decoded"
            );
            ProviderEventKind::Malformed { event_type, reason }
        }),
    };

    Ok(ProviderEvent {
        id: envelope.id,
        created,
        livemode: envelope.livemode,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event_type: &str, object: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_704_067_200,
            "livemode": false,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn parses_checkout_session_completed() {
        let payload = envelope(
            "checkout.session.completed",
            json!({
                "id": "cs_test_1",
                "object": "checkout.session",
                "customer": "cus_1",
                "subscription": "sub_1",
                "payment_status": "paid",
                "status": "complete",
                "amount_total": 1500,
                "currency": "usd",
                "metadata": { "flow": "registration" }
            }),
        );

        let event = parse_event(&payload).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.created.as_unix_secs(), 1_704_067_200);
        match event.kind {
            ProviderEventKind::CheckoutCompleted(session) => {
                assert_eq!(session.session_id, "cs_test_1");
                assert_eq!(session.amount_total, Some(1500));
                assert!(session.is_paid());
                assert_eq!(session.metadata.get("flow").map(String::as_str), Some("registration"));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn parses_subscription_updated() {
        let payload = envelope(
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "object": "subscription",
                "customer": "cus_1",
                "status": "past_due",
                "current_period_start": 1_704_067_200,
                "current_period_end": 1_706_745_600,
                "cancel_at_period_end": true
            }),
        );

        match parse_event(&payload).unwrap().kind {
            ProviderEventKind::SubscriptionUpdated(sub) => {
                assert_eq!(sub.status, "past_due");
                assert!(sub.cancel_at_period_end);
                assert_eq!(sub.current_period_end.map(|t| t.as_unix_secs()), Some(1_706_745_600));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn parses_invoice_with_billing_reason() {
        let payload = envelope(
            "invoice.payment_succeeded",
            json!({
                "id": "in_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "amount_paid": 3900,
                "amount_due": 3900,
                "currency": "usd",
                "billing_reason": "subscription_cycle"
            }),
        );

        match parse_event(&payload).unwrap().kind {
            ProviderEventKind::InvoicePaymentSucceeded(invoice) => {
                assert_eq!(invoice.amount_paid, 3900);
                assert!(!invoice.opened_by_checkout());
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn parses_charge_refunds() {
        let payload = envelope(
            "charge.refunded",
            json!({
                "id": "ch_1",
                "payment_intent": "pi_1",
                "invoice": "in_1",
                "customer": "cus_1",
                "amount": 3900,
                "refunds": { "data": [ { "id": "re_1", "amount": 1000, "created": 1_704_067_300 } ] }
            }),
        );

        match parse_event(&payload).unwrap().kind {
            ProviderEventKind::ChargeRefunded(charge) => {
                assert_eq!(charge.invoice_id.as_deref(), Some("in_1"));
                assert_eq!(charge.customer_id.as_deref(), Some("cus_1"));
                assert_eq!(charge.refunds.len(), 1);
                assert_eq!(charge.refunds[0].amount, 1000);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn undecodable_object_becomes_malformed() {
        let payload = envelope("customer.subscription.deleted", json!({ "id": "sub_1" }));

        let event = parse_event(&payload).unwrap();
        assert!(matches!(
            event.kind,
            ProviderEventKind::Malformed { event_type: EventType::SubscriptionDeleted, .. }
        ));
    }

    #[test]
    fn unknown_type_is_kept_by_name() {
        let payload = envelope("customer.created", json!({ "id": "cus_1" }));

        let event = parse_event(&payload).unwrap();
        assert_eq!(event.kind.type_name(), "customer.created");
        assert_eq!(event.kind.event_type(), None);
    }

    #[test]
    fn broken_envelope_is_a_parse_error() {
        let err = parse_event(b"not json").unwrap_err();
        assert!(matches!(err, WebhookError::ParseError(_)));
    }
}
