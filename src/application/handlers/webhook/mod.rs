//! Webhook handlers - payment provider events applied to local state.

mod charge_refunded;
mod checkout_completed;
mod handle_payment_webhook;
mod invoice_events;
mod subscription_events;

pub use charge_refunded::ChargeRefundedHandler;
pub use checkout_completed::CheckoutCompletedHandler;
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
    WebhookDependencies, WebhookEventHandler,
};
pub use invoice_events::InvoiceEventsHandler;
pub use subscription_events::SubscriptionEventsHandler;
