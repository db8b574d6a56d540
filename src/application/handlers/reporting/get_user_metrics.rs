//! GetUserMetricsHandler - Query handler for the account summary job.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::domain::entitlement::has_premium_access;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::subscription::SubscriptionStatus;
use crate::ports::EntitlementReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserMetrics {
    pub total_users: usize,
    /// Users per subscription status; users without one count as `inactive`.
    pub by_status: BTreeMap<&'static str, usize>,
    pub admins: usize,
    /// Users with premium access right now.
    pub active: usize,
    /// Users who signed up with a promo code.
    pub promo_registered: usize,
    pub verified: usize,
}

pub struct GetUserMetricsHandler {
    reader: Arc<dyn EntitlementReader>,
}

impl GetUserMetricsHandler {
    pub fn new(reader: Arc<dyn EntitlementReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(&self) -> Result<UserMetrics, DomainError> {
        let now = Timestamp::now();
        let mut metrics = UserMetrics::default();

        for account in self.reader.list_accounts().await? {
            let status = account
                .subscription
                .as_ref()
                .map_or(SubscriptionStatus::Inactive, |s| s.status);
            *metrics.by_status.entry(status.as_str()).or_default() += 1;

            metrics.total_users += 1;
            metrics.admins += usize::from(account.user.is_admin);
            metrics.verified += usize::from(account.user.is_verified);
            metrics.promo_registered += usize::from(account.user.registration_promo_code.is_some());
            metrics.active += usize::from(has_premium_access(
                &account.user,
                account.subscription.as_ref(),
                now,
            ));
        }

        info!(
            total_users = metrics.total_users,
            active = metrics.active,
            admins = metrics.admins,
            "user metrics computed"
        );
        Ok(metrics)
    }
}
