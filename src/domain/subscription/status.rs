//! Subscription status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a subscription.
///
/// The payment provider may move a subscription between any two of these,
/// so it has no restricted transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
    Cancelled,
    PastDue,
    Trialing,
    AdminAccess,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 6] = [
        SubscriptionStatus::Inactive,
        SubscriptionStatus::Active,
        SubscriptionStatus::Cancelled,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Trialing,
        SubscriptionStatus::AdminAccess,
    ];

    /// Statuses that grant premium access while unexpired.
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::AdminAccess
        )
    }

    /// Maps a provider subscription status onto ours.
    ///
    /// Returns `None` for statuses the provider may add in future API versions.
    pub fn from_provider_status(status: &str) -> Option<Self> {
        match status {
            "active" => Some(SubscriptionStatus::Active),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "past_due" | "unpaid" => Some(SubscriptionStatus::PastDue),
            "canceled" | "cancelled" => Some(SubscriptionStatus::Cancelled),
            "incomplete" | "incomplete_expired" | "paused" => Some(SubscriptionStatus::Inactive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::AdminAccess => "admin_access",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_trialing_and_admin_grant_access() {
        let granting: Vec<_> = SubscriptionStatus::ALL
            .into_iter()
            .filter(SubscriptionStatus::grants_access)
            .collect();
        assert_eq!(
            granting,
            vec![
                SubscriptionStatus::Active,
                SubscriptionStatus::Trialing,
                SubscriptionStatus::AdminAccess
            ]
        );
    }

    #[test]
    fn provider_statuses_map_one_to_one() {
        assert_eq!(
            SubscriptionStatus::from_provider_status("canceled"),
            Some(SubscriptionStatus::Cancelled)
        );
        assert_eq!(
            SubscriptionStatus::from_provider_status("past_due"),
            Some(SubscriptionStatus::PastDue)
        );
        assert_eq!(
            SubscriptionStatus::from_provider_status("incomplete_expired"),
            Some(SubscriptionStatus::Inactive)
        );
        assert_eq!(SubscriptionStatus::from_provider_status("mystery"), None);
    }

    #[test]
    fn parse_inverts_as_str() {
        for status in SubscriptionStatus::ALL {
            assert_eq!(SubscriptionStatus::parse(status.as_str()), Some(status));
        }
    }
}
