//! Plans, tiers and canonical plan pricing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// The plan a subscription is billed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Monthly,
    Annual,
    /// Granted by an administrator, never billed.
    Admin,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Monthly => "monthly",
            Plan::Annual => "annual",
            Plan::Admin => "admin",
        }
    }

    /// Plans a customer can pay for through checkout.
    pub fn is_purchasable(&self) -> bool {
        !matches!(self, Plan::Admin)
    }

    /// Length of one paid period, or `None` for plans that never lapse.
    pub fn period_days(&self) -> Option<i64> {
        match self {
            Plan::Monthly => Some(30),
            Plan::Annual => Some(365),
            Plan::Admin => None,
        }
    }

    /// Tier a user is shown while this plan grants access.
    pub fn tier(&self) -> SubscriptionTier {
        match self {
            Plan::Monthly => SubscriptionTier::Monthly,
            Plan::Annual => SubscriptionTier::Annual,
            Plan::Admin => SubscriptionTier::Admin,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Plan::Monthly),
            "annual" | "yearly" => Ok(Plan::Annual),
            "admin" => Ok(Plan::Admin),
            other => Err(ValidationError::invalid_format(
                "plan",
                format!("unknown plan '{}'", other),
            )),
        }
    }
}

/// Cached tier on the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Monthly,
    Annual,
    Admin,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Monthly => "monthly",
            SubscriptionTier::Annual => "annual",
            SubscriptionTier::Admin => "admin",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical list prices in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPricing {
    pub monthly_cents: i64,
    pub annual_cents: i64,
}

impl PlanPricing {
    pub const DEFAULT_MONTHLY_CENTS: i64 = 3900;
    pub const DEFAULT_ANNUAL_CENTS: i64 = 39000;

    pub fn new(monthly_cents: i64, annual_cents: i64) -> Self {
        Self {
            monthly_cents,
            annual_cents,
        }
    }

    pub fn price_for(&self, plan: Plan) -> i64 {
        match plan {
            Plan::Monthly => self.monthly_cents,
            Plan::Annual => self.annual_cents,
            Plan::Admin => 0,
        }
    }
}

impl Default for PlanPricing {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MONTHLY_CENTS, Self::DEFAULT_ANNUAL_CENTS)
    }
}
