//! HandlePaymentWebhookHandler - Command handler for payment provider webhooks.
//!
//! Verifies the delivery, then routes the event to the handler registered
//! for its type. Handlers are idempotent on natural keys (checkout session
//! id, invoice id, refund id) and on the subscription's last provider event
//! time, so redelivery in any order converges on the same state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::webhook::{EventType, ProviderEvent, ProviderEventKind, WebhookError, WebhookOutcome};
use crate::ports::{
    EmailSender, PaymentProvider, PaymentRepository, PendingRegistrationRepository,
    PromoCodeRepository, SubscriptionRepository, UserRepository,
};

use super::{
    ChargeRefundedHandler, CheckoutCompletedHandler, InvoiceEventsHandler,
    SubscriptionEventsHandler,
};

/// Handles one or more event types.
///
/// Return `Ok` for every event that should be acknowledged, including the
/// ones that were dropped. `Err` asks the provider to redeliver.
#[async_trait]
pub trait WebhookEventHandler: Send + Sync {
    fn event_types(&self) -> &'static [EventType];

    async fn handle(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError>;
}

/// Stores and collaborators shared by the built-in event handlers.
#[derive(Clone)]
pub struct WebhookDependencies {
    pub users: Arc<dyn UserRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub pending_registrations: Arc<dyn PendingRegistrationRepository>,
    pub promo_codes: Arc<dyn PromoCodeRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub email_sender: Arc<dyn EmailSender>,
    /// Used when an event carries no currency.
    pub currency: String,
}

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw webhook payload.
    pub payload: Vec<u8>,
    /// Webhook signature header.
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlePaymentWebhookResult {
    pub event_id: String,
    pub event_type: String,
    pub outcome: WebhookOutcome,
}

pub struct HandlePaymentWebhookHandler {
    provider: Arc<dyn PaymentProvider>,
    handlers: HashMap<EventType, Arc<dyn WebhookEventHandler>>,
}

impl HandlePaymentWebhookHandler {
    /// A processor with no handlers; every event is ignored until some are
    /// registered.
    pub fn new(provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            provider,
            handlers: HashMap::new(),
        }
    }

    /// Routes the handler's event types to it, replacing earlier
    /// registrations for those types.
    pub fn register(mut self, handler: Arc<dyn WebhookEventHandler>) -> Self {
        for event_type in handler.event_types() {
            self.handlers.insert(*event_type, handler.clone());
        }
        self
    }

    pub fn with_default_handlers(provider: Arc<dyn PaymentProvider>, deps: WebhookDependencies) -> Self {
        Self::new(provider)
            .register(Arc::new(CheckoutCompletedHandler::new(deps.clone())))
            .register(Arc::new(SubscriptionEventsHandler::new(deps.clone())))
            .register(Arc::new(InvoiceEventsHandler::new(deps.clone())))
            .register(Arc::new(ChargeRefundedHandler::new(deps)))
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        // 1. Verify signature and decode
        let event = self
            .provider
            .construct_webhook_event(&cmd.payload, &cmd.signature)
            .map_err(|err| {
                warn!(error = %err, "webhook rejected");
                err
            })?;

        // 2. Dispatch
        let outcome = self.handle_event(&event).await?;

        Ok(HandlePaymentWebhookResult {
            event_id: event.id,
            event_type: event.kind.type_name().to_string(),
            outcome,
        })
    }

    /// Dispatches an already verified event.
    pub async fn handle_event(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        let type_name = event.kind.type_name();

        let outcome = match &event.kind {
            ProviderEventKind::Malformed { reason, .. } => WebhookOutcome::dropped(reason.clone()),
            _ => match event.kind.event_type().and_then(|t| self.handlers.get(&t)) {
                Some(handler) => match handler.handle(event).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(
                            event_id = %event.id,
                            event_type = type_name,
                            error = %err,
                            retryable = err.is_retryable(),
                            "webhook processing failed"
                        );
                        return Err(err);
                    }
                },
                None => WebhookOutcome::Ignored,
            },
        };

        match &outcome {
            WebhookOutcome::Applied { promo_redemption_failed } => info!(
                event_id = %event.id,
                event_type = type_name,
                promo_redemption_failed,
                "webhook applied"
            ),
            WebhookOutcome::Dropped { reason } => warn!(
                event_id = %event.id,
                event_type = type_name,
                reason = %reason,
                "webhook dropped"
            ),
            other => debug!(
                event_id = %event.id,
                event_type = type_name,
                outcome = other.label(),
                "webhook acknowledged"
            ),
        }
        Ok(outcome)
    }
}
