//! GetInactiveUsersHandler - Query handler for the re-engagement job.
//!
//! Lists users without premium access whose last subscription period ended
//! before a cut-off, plus users who never subscribed.

use std::sync::Arc;

use tracing::debug;

use crate::domain::entitlement::has_premium_access;
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::domain::user::Email;
use crate::ports::EntitlementReader;

#[derive(Debug, Clone, Copy)]
pub struct GetInactiveUsersQuery {
    /// Only accounts whose access ended before this moment.
    pub since: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactiveUser {
    pub user_id: UserId,
    pub email: Email,
    pub status: SubscriptionStatus,
    /// `None` for users who never had a subscription period.
    pub ended_at: Option<Timestamp>,
}

pub struct GetInactiveUsersHandler {
    reader: Arc<dyn EntitlementReader>,
}

impl GetInactiveUsersHandler {
    pub fn new(reader: Arc<dyn EntitlementReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(&self, query: GetInactiveUsersQuery) -> Result<Vec<InactiveUser>, DomainError> {
        let now = Timestamp::now();
        let accounts = self.reader.list_accounts().await?;
        let total = accounts.len();

        let inactive: Vec<InactiveUser> = accounts
            .into_iter()
            .filter(|a| !has_premium_access(&a.user, a.subscription.as_ref(), now))
            .filter_map(|a| {
                let ended_at = a.subscription.as_ref().and_then(access_ended_at);
                match ended_at {
                    Some(end) if !end.is_before(&query.since) => None,
                    _ => Some(InactiveUser {
                        user_id: a.user.id,
                        email: a.user.email,
                        status: a.subscription.map_or(SubscriptionStatus::Inactive, |s| s.status),
                        ended_at,
                    }),
                }
            })
            .collect();

        debug!(total, inactive = inactive.len(), since = %query.since, "inactive users listed");
        Ok(inactive)
    }
}

/// When access stopped: the period end, else the cancellation time.
fn access_ended_at(subscription: &Subscription) -> Option<Timestamp> {
    subscription.current_period_end.or(subscription.cancelled_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::fixtures::Stores;
    use crate::ports::{SubscriptionRepository, UserRepository};

    async fn subscriber(
        stores: &Stores,
        email: &str,
        status: SubscriptionStatus,
        end: Option<Timestamp>,
    ) -> UserId {
        let user = stores.add_user(email).await;
        let mut sub = Subscription::new_inactive(user.id, Timestamp::now());
        sub.status = status;
        sub.current_period_end = end;
        stores.subscriptions.insert(&sub).await.unwrap();
        user.id
    }

    #[tokio::test]
    async fn lists_lapsed_and_never_subscribed_users() {
        let stores = Stores::new();
        let now = Timestamp::now();
        let cancelled = SubscriptionStatus::Cancelled;
        let lapsed = subscriber(&stores, "lapsed@example.com", cancelled, Some(now.add_days(-40))).await;
        let recent = subscriber(&stores, "recent@example.com", cancelled, Some(now.add_days(-2))).await;
        let active = SubscriptionStatus::Active;
        subscriber(&stores, "active@example.com", active, Some(now.add_days(20))).await;
        let never = stores.add_user("never@example.com").await.id;

        let inactive = GetInactiveUsersHandler::new(stores.reader())
            .handle(GetInactiveUsersQuery { since: now.add_days(-30) })
            .await
            .unwrap();

        let ids: Vec<UserId> = inactive.iter().map(|u| u.user_id).collect();
        assert!(ids.contains(&lapsed));
        assert!(ids.contains(&never));
        assert!(!ids.contains(&recent));
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn admin_users_are_never_inactive() {
        let stores = Stores::new();
        let mut admin = stores.add_user("admin@example.com").await;
        admin.promote_to_admin(Timestamp::now());
        stores.users.update(&admin).await.unwrap();

        let inactive = GetInactiveUsersHandler::new(stores.reader())
            .handle(GetInactiveUsersQuery { since: Timestamp::now() })
            .await
            .unwrap();

        assert!(inactive.is_empty());
    }
}
