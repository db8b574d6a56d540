//! RegistrationStatusHandler - Query handler for "where is this signup?".
//!
//! Answered from local state while it is fresh. Once a started checkout has
//! gone quiet past the stale window the provider is asked directly, so a
//! user whose webhook is late still sees their payment acknowledged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::foundation::Timestamp;
use crate::domain::registration::{
    CheckoutMetadata, CheckoutSubject, PendingRegistration, RegistrationError, RegistrationStatus,
    RegistrationWindows,
};
use crate::domain::user::Email;
use crate::ports::{
    CheckoutSessionStatus, PaymentErrorCode, PaymentProvider, PendingRegistrationRepository,
    UserRepository,
};

use super::super::support::call_provider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStatusQuery {
    ByEmail(String),
    /// Session id from the checkout redirect.
    BySessionId(String),
}

pub struct RegistrationStatusHandler {
    users: Arc<dyn UserRepository>,
    pending_registrations: Arc<dyn PendingRegistrationRepository>,
    provider: Arc<dyn PaymentProvider>,
    windows: RegistrationWindows,
    provider_timeout: Duration,
}

impl RegistrationStatusHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        pending_registrations: Arc<dyn PendingRegistrationRepository>,
        provider: Arc<dyn PaymentProvider>,
        windows: RegistrationWindows,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            users,
            pending_registrations,
            provider,
            windows,
            provider_timeout,
        }
    }

    pub async fn handle(
        &self,
        query: RegistrationStatusQuery,
    ) -> Result<RegistrationStatus, RegistrationError> {
        let now = Timestamp::now();
        match query {
            RegistrationStatusQuery::ByEmail(raw) => {
                let email = Email::parse(&raw)?;
                if self.users.find_by_email(&email).await?.is_some() {
                    return Ok(RegistrationStatus::Completed);
                }
                match self.pending_registrations.find_by_email(&email).await? {
                    Some(pending) => Ok(self.pending_status(&pending, now).await),
                    None => Ok(RegistrationStatus::NotFound),
                }
            }
            RegistrationStatusQuery::BySessionId(session_id) => {
                if let Some(pending) = self
                    .pending_registrations
                    .find_by_session_id(&session_id)
                    .await?
                {
                    return Ok(self.pending_status(&pending, now).await);
                }
                self.session_status(&session_id).await
            }
        }
    }

    async fn pending_status(&self, pending: &PendingRegistration, now: Timestamp) -> RegistrationStatus {
        if pending.is_expired(now) {
            return RegistrationStatus::Expired;
        }
        let Some(session_id) = pending.checkout_session_id.clone() else {
            return RegistrationStatus::Pending;
        };
        if !pending.is_checkout_stale(&self.windows, now) {
            return RegistrationStatus::CheckoutStarted {
                session_id,
                stale: false,
                payment_confirmed: false,
            };
        }

        match call_provider(
            self.provider_timeout,
            "retrieve_session",
            self.provider.retrieve_session(&session_id),
        )
        .await
        {
            Ok(details) if details.status == CheckoutSessionStatus::Expired => {
                debug!(session_id = %session_id, "stale checkout expired at the provider");
                RegistrationStatus::Expired
            }
            Ok(details) => RegistrationStatus::CheckoutStarted {
                session_id,
                stale: true,
                payment_confirmed: details.is_paid(),
            },
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "stale checkout lookup failed");
                RegistrationStatus::CheckoutStarted {
                    session_id,
                    stale: true,
                    payment_confirmed: false,
                }
            }
        }
    }

    /// The pending record is gone; the provider and the user store decide.
    async fn session_status(&self, session_id: &str) -> Result<RegistrationStatus, RegistrationError> {
        let details = match call_provider(
            self.provider_timeout,
            "retrieve_session",
            self.provider.retrieve_session(session_id),
        )
        .await
        {
            Ok(details) => details,
            Err(err) if err.code == PaymentErrorCode::NotFound => {
                return Ok(RegistrationStatus::NotFound);
            }
            Err(err) => return Err(RegistrationError::Provider(err.to_string())),
        };

        let user = match CheckoutMetadata::from_map(&details.metadata).map(|m| m.subject) {
            Ok(CheckoutSubject::Registration { email, .. }) => {
                self.users.find_by_email(&email).await?
            }
            Ok(CheckoutSubject::ExistingUser { user_id }) => self.users.find_by_id(&user_id).await?,
            Err(err) => {
                debug!(session_id = %session_id, error = %err, "session carries no checkout metadata");
                None
            }
        };

        Ok(match (user, details.status) {
            (Some(_), _) if details.is_paid() => RegistrationStatus::Completed,
            (_, CheckoutSessionStatus::Expired) => RegistrationStatus::Expired,
            (_, _) if details.is_paid() => RegistrationStatus::CheckoutStarted {
                session_id: session_id.to_string(),
                stale: true,
                payment_confirmed: true,
            },
            _ => RegistrationStatus::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::fixtures::Stores;
    use crate::domain::registration::NewPendingRegistration;
    use crate::domain::subscription::Plan;
    use crate::ports::{CheckoutSessionDetails, PaymentError};
    use std::collections::HashMap;

    fn handler(stores: &Stores) -> RegistrationStatusHandler {
        RegistrationStatusHandler::new(
            stores.users.clone(),
            stores.pending.clone(),
            Arc::new(stores.provider.clone()),
            RegistrationWindows::default(),
            Duration::from_secs(5),
        )
    }

    async fn pending_with_session(
        stores: &Stores,
        session_id: Option<&str>,
        started_at: Timestamp,
    ) -> PendingRegistration {
        let mut pending = PendingRegistration::create(
            NewPendingRegistration {
                name: "Grace".to_string(),
                email: Email::parse("grace@example.com").unwrap(),
                password_hash: "hash".to_string(),
                promo_code: None,
                plan: Plan::Monthly,
            },
            &RegistrationWindows::default(),
            started_at,
        )
        .unwrap();
        if let Some(id) = session_id {
            pending.start_checkout(id, started_at).unwrap();
        }
        stores.pending.insert(&pending, started_at).await.unwrap();
        pending
    }

    fn session(id: &str, status: CheckoutSessionStatus, payment_status: &str) -> CheckoutSessionDetails {
        CheckoutSessionDetails {
            id: id.to_string(),
            status,
            payment_status: payment_status.to_string(),
            customer_id: None,
            subscription_id: None,
            amount_total: Some(3900),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn existing_user_is_completed() {
        let stores = Stores::new();
        stores.add_user("ada@example.com").await;

        let status = handler(&stores)
            .handle(RegistrationStatusQuery::ByEmail("ADA@example.com".to_string()))
            .await
            .unwrap();

        assert_eq!(status, RegistrationStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let stores = Stores::new();

        let status = handler(&stores)
            .handle(RegistrationStatusQuery::ByEmail("nobody@example.com".to_string()))
            .await
            .unwrap();

        assert_eq!(status, RegistrationStatus::NotFound);
    }

    #[tokio::test]
    async fn fresh_checkout_is_answered_locally() {
        let stores = Stores::new();
        pending_with_session(&stores, Some("cs_local"), Timestamp::now()).await;

        let status = handler(&stores)
            .handle(RegistrationStatusQuery::ByEmail("grace@example.com".to_string()))
            .await
            .unwrap();

        assert_eq!(
            status,
            RegistrationStatus::CheckoutStarted {
                session_id: "cs_local".to_string(),
                stale: false,
                payment_confirmed: false,
            }
        );
        assert!(!stores.provider.was_called("retrieve_session"));
    }

    #[tokio::test]
    async fn stale_checkout_consults_provider() {
        let stores = Stores::new();
        pending_with_session(&stores, Some("cs_paid"), Timestamp::now().add_minutes(-10)).await;
        stores
            .provider
            .set_session_details(session("cs_paid", CheckoutSessionStatus::Complete, "paid"));

        let status = handler(&stores)
            .handle(RegistrationStatusQuery::BySessionId("cs_paid".to_string()))
            .await
            .unwrap();

        assert_eq!(
            status,
            RegistrationStatus::CheckoutStarted {
                session_id: "cs_paid".to_string(),
                stale: true,
                payment_confirmed: true,
            }
        );
    }

    #[tokio::test]
    async fn stale_checkout_expired_at_provider_is_expired() {
        let stores = Stores::new();
        pending_with_session(&stores, Some("cs_gone"), Timestamp::now().add_minutes(-10)).await;
        stores
            .provider
            .set_session_details(session("cs_gone", CheckoutSessionStatus::Expired, "unpaid"));

        let status = handler(&stores)
            .handle(RegistrationStatusQuery::ByEmail("grace@example.com".to_string()))
            .await
            .unwrap();

        assert_eq!(status, RegistrationStatus::Expired);
    }

    #[tokio::test]
    async fn provider_outage_keeps_local_answer() {
        let stores = Stores::new();
        pending_with_session(&stores, Some("cs_slow"), Timestamp::now().add_minutes(-10)).await;
        stores
            .provider
            .set_method_error("retrieve_session", PaymentError::network("unreachable"));

        let status = handler(&stores)
            .handle(RegistrationStatusQuery::ByEmail("grace@example.com".to_string()))
            .await
            .unwrap();

        assert!(matches!(
            status,
            RegistrationStatus::CheckoutStarted { stale: true, payment_confirmed: false, .. }
        ));
    }

    #[tokio::test]
    async fn pending_without_session_is_pending() {
        let stores = Stores::new();
        pending_with_session(&stores, None, Timestamp::now()).await;

        let status = handler(&stores)
            .handle(RegistrationStatusQuery::ByEmail("grace@example.com".to_string()))
            .await
            .unwrap();

        assert_eq!(status, RegistrationStatus::Pending);
    }

    #[tokio::test]
    async fn lapsed_pending_is_expired() {
        let stores = Stores::new();
        pending_with_session(&stores, None, Timestamp::now().add_hours(-25)).await;

        let status = handler(&stores)
            .handle(RegistrationStatusQuery::ByEmail("grace@example.com".to_string()))
            .await
            .unwrap();

        assert_eq!(status, RegistrationStatus::Expired);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let stores = Stores::new();

        let status = handler(&stores)
            .handle(RegistrationStatusQuery::BySessionId("cs_missing".to_string()))
            .await
            .unwrap();

        assert_eq!(status, RegistrationStatus::NotFound);
    }
}
