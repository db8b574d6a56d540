//! Provider-neutral webhook events.
//!
//! Adapters decode the provider's wire format into these types; handlers
//! never see raw JSON.

use std::collections::HashMap;
use std::fmt;

use crate::domain::foundation::Timestamp;

/// Event types the processor has handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    CheckoutSessionCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    ChargeRefunded,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::CheckoutSessionCompleted,
        EventType::SubscriptionCreated,
        EventType::SubscriptionUpdated,
        EventType::SubscriptionDeleted,
        EventType::InvoicePaymentSucceeded,
        EventType::InvoicePaymentFailed,
        EventType::ChargeRefunded,
    ];

    /// Provider wire name, e.g. `checkout.session.completed`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CheckoutSessionCompleted => "checkout.session.completed",
            EventType::SubscriptionCreated => "customer.subscription.created",
            EventType::SubscriptionUpdated => "customer.subscription.updated",
            EventType::SubscriptionDeleted => "customer.subscription.deleted",
            EventType::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            EventType::InvoicePaymentFailed => "invoice.payment_failed",
            EventType::ChargeRefunded => "charge.refunded",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompleted {
    pub session_id: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
    pub metadata: HashMap<String, String>,
}

impl CheckoutCompleted {
    pub fn is_paid(&self) -> bool {
        matches!(self.payment_status.as_str(), "paid" | "no_payment_required")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSubscription {
    pub subscription_id: String,
    pub customer_id: Option<String>,
    /// Provider status string, mapped by `SubscriptionStatus::from_provider_status`.
    pub status: String,
    pub current_period_start: Timestamp,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInvoice {
    pub invoice_id: String,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub amount_paid: i64,
    pub amount_due: i64,
    pub currency: String,
    /// `subscription_create` on the invoice opened by checkout.
    pub billing_reason: Option<String>,
}

impl ProviderInvoice {
    /// The first invoice of a subscription is already recorded by the
    /// checkout that created it.
    pub fn opened_by_checkout(&self) -> bool {
        self.billing_reason.as_deref() == Some("subscription_create")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRefund {
    pub refund_id: String,
    pub amount: i64,
    pub created: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCharge {
    pub charge_id: String,
    pub payment_intent_id: Option<String>,
    pub invoice_id: Option<String>,
    pub customer_id: Option<String>,
    pub amount: i64,
    pub refunds: Vec<ProviderRefund>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEventKind {
    CheckoutCompleted(CheckoutCompleted),
    SubscriptionCreated(ProviderSubscription),
    SubscriptionUpdated(ProviderSubscription),
    SubscriptionDeleted(ProviderSubscription),
    InvoicePaymentSucceeded(ProviderInvoice),
    InvoicePaymentFailed(ProviderInvoice),
    ChargeRefunded(ProviderCharge),
    /// A known type whose payload could not be decoded.
    Malformed { event_type: EventType, reason: String },
    /// A type with no handler.
    Unknown { event_type: String },
}

impl ProviderEventKind {
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            ProviderEventKind::CheckoutCompleted(_) => Some(EventType::CheckoutSessionCompleted),
            ProviderEventKind::SubscriptionCreated(_) => Some(EventType::SubscriptionCreated),
            ProviderEventKind::SubscriptionUpdated(_) => Some(EventType::SubscriptionUpdated),
            ProviderEventKind::SubscriptionDeleted(_) => Some(EventType::SubscriptionDeleted),
            ProviderEventKind::InvoicePaymentSucceeded(_) => Some(EventType::InvoicePaymentSucceeded),
            ProviderEventKind::InvoicePaymentFailed(_) => Some(EventType::InvoicePaymentFailed),
            ProviderEventKind::ChargeRefunded(_) => Some(EventType::ChargeRefunded),
            ProviderEventKind::Malformed { event_type, .. } => Some(*event_type),
            ProviderEventKind::Unknown { .. } => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            ProviderEventKind::Unknown { event_type } => event_type,
            other => other.event_type().map_or("unknown", |t| t.as_str()),
        }
    }
}

/// A verified event from the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub id: String,
    pub created: Timestamp,
    pub livemode: bool,
    pub kind: ProviderEventKind,
}
