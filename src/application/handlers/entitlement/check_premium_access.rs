//! CheckPremiumAccessHandler - Query handler for "may this user use the
//! paid tier right now?".
//!
//! Decided from the user and subscription records, never from the cached
//! flag. A cache found out of step is rewritten on the way out.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::entitlement::{resolve_access, AccessDecision};
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::SubscriptionError;
use crate::ports::{SubscriptionRepository, UserRepository};

use super::super::support::sync_user_entitlement;

#[derive(Debug, Clone, Copy)]
pub struct CheckPremiumAccessQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckPremiumAccessResult {
    pub user_id: UserId,
    pub decision: AccessDecision,
    /// The user's cached entitlement disagreed and was rewritten.
    pub cache_repaired: bool,
}

impl CheckPremiumAccessResult {
    pub fn has_premium_access(&self) -> bool {
        self.decision.granted
    }
}

pub struct CheckPremiumAccessHandler {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl CheckPremiumAccessHandler {
    pub fn new(users: Arc<dyn UserRepository>, subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        Self { users, subscriptions }
    }

    pub async fn handle(
        &self,
        query: CheckPremiumAccessQuery,
    ) -> Result<CheckPremiumAccessResult, SubscriptionError> {
        let now = Timestamp::now();
        let user = self
            .users
            .find_by_id(&query.user_id)
            .await?
            .ok_or(SubscriptionError::UserNotFound(query.user_id))?;
        let subscription = self.subscriptions.find_by_user_id(&query.user_id).await?;

        let decision = resolve_access(&user, subscription.as_ref(), now);

        let cache_repaired = user.entitlement_cache_is_stale(subscription.as_ref());
        if cache_repaired {
            warn!(
                user_id = %user.id,
                cached_status = user.subscription_status.as_str(),
                "entitlement cache out of step with subscription"
            );
            sync_user_entitlement(
                self.users.as_ref(),
                self.subscriptions.as_ref(),
                &user.id,
                now,
            )
            .await?;
            info!(user_id = %user.id, "entitlement cache repaired");
        }

        Ok(CheckPremiumAccessResult {
            user_id: user.id,
            decision,
            cache_repaired,
        })
    }
}
