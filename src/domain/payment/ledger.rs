//! Payment ledger entry.
//!
//! A payment is immutable once written except for refunds, which only move
//! its status forward: succeeded → partially_refunded → refunded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{
    PaymentId, PriceBreakdown, StateMachine, SubscriptionId, Timestamp, UserId,
};
use crate::domain::promo::PromoCodeName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
    PartiallyRefunded,
    Refunded,
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Succeeded => vec![PartiallyRefunded, Refunded],
            PartiallyRefunded => vec![PartiallyRefunded, Refunded],
            Failed | Refunded => vec![],
        }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// What produced the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    Checkout,
    Invoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub external_refund_id: String,
    pub amount: i64,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    Applied,
    /// The refund id was already on the ledger.
    AlreadyRecorded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentLedgerError {
    #[error("payment {id} in status {status} cannot be refunded")]
    NotRefundable { id: PaymentId, status: &'static str },

    #[error("refund of {requested} exceeds refundable {refundable} on payment {id}")]
    ExceedsAmount {
        id: PaymentId,
        requested: i64,
        refundable: i64,
    },

    #[error("refund amount must be positive, got {0}")]
    InvalidAmount(i64),
}

/// Fields supplied when recording a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: UserId,
    pub subscription_id: Option<SubscriptionId>,
    /// Natural key: checkout session or invoice id.
    pub external_charge_id: String,
    pub payment_intent_id: Option<String>,
    pub currency: String,
    pub payment_method: Option<String>,
    pub source: PaymentSource,
    pub promo_code: Option<PromoCodeName>,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub subscription_id: Option<SubscriptionId>,
    pub external_charge_id: String,
    pub payment_intent_id: Option<String>,
    /// Cents actually charged.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub source: PaymentSource,
    pub promo_code: Option<PromoCodeName>,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub refunds: Vec<Refund>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Payment {
    pub fn succeeded(new: NewPayment, now: Timestamp) -> Self {
        Self::record(new, PaymentStatus::Succeeded, now)
    }

    pub fn failed(new: NewPayment, now: Timestamp) -> Self {
        Self::record(new, PaymentStatus::Failed, now)
    }

    fn record(new: NewPayment, status: PaymentStatus, now: Timestamp) -> Self {
        Self {
            id: PaymentId::new(),
            user_id: new.user_id,
            subscription_id: new.subscription_id,
            external_charge_id: new.external_charge_id,
            payment_intent_id: new.payment_intent_id,
            amount: new.breakdown.final_amount(),
            currency: new.currency.to_ascii_lowercase(),
            status,
            payment_method: new.payment_method,
            source: new.source,
            promo_code: new.promo_code,
            original_amount: new.breakdown.original_amount(),
            discount_amount: new.breakdown.discount_amount(),
            refunds: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn refunded_amount(&self) -> i64 {
        self.refunds.iter().map(|r| r.amount).sum()
    }

    pub fn net_amount(&self) -> i64 {
        self.amount - self.refunded_amount()
    }

    /// Appends a refund. Replaying a known refund id is a no-op.
    pub fn add_refund(&mut self, refund: Refund) -> Result<RefundOutcome, PaymentLedgerError> {
        if self
            .refunds
            .iter()
            .any(|r| r.external_refund_id == refund.external_refund_id)
        {
            return Ok(RefundOutcome::AlreadyRecorded);
        }
        if refund.amount <= 0 {
            return Err(PaymentLedgerError::InvalidAmount(refund.amount));
        }
        let refundable = self.net_amount();
        if refund.amount > refundable {
            return Err(PaymentLedgerError::ExceedsAmount {
                id: self.id,
                requested: refund.amount,
                refundable,
            });
        }

        let target = if refund.amount == refundable {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| PaymentLedgerError::NotRefundable {
                id: self.id,
                status: self.status.as_str(),
            })?;
        self.updated_at = refund.created_at;
        self.refunds.push(refund);
        Ok(RefundOutcome::Applied)
    }
}
