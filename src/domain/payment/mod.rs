//! Payment ledger entries.

mod ledger;

pub use ledger::{
    NewPayment, Payment, PaymentLedgerError, PaymentSource, PaymentStatus, Refund, RefundOutcome,
};
