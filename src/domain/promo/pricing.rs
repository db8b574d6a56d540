//! Discount arithmetic and price quotes.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PriceBreakdown, PromoCodeId};
use crate::domain::subscription::Plan;

use super::PromoCodeName;

/// How a promo code reduces the list price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` cents off, capped at the original price.
    FixedAmount,
    /// `discount_value` percent off, rounded down to whole cents.
    Percentage,
    /// Everything off.
    FreeAccess,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::FixedAmount => "fixed_amount",
            DiscountType::Percentage => "percentage",
            DiscountType::FreeAccess => "free_access",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fixed_amount" => Some(DiscountType::FixedAmount),
            "percentage" => Some(DiscountType::Percentage),
            "free_access" => Some(DiscountType::FreeAccess),
            _ => None,
        }
    }
}

/// Discount in cents for `original` under the given rule.
pub fn formula_discount(discount_type: DiscountType, discount_value: i64, original: i64) -> i64 {
    let original = original.max(0);
    let discount = match discount_type {
        DiscountType::FixedAmount => discount_value,
        DiscountType::Percentage => {
            let pct = i128::from(discount_value.clamp(0, 100));
            // floor((original * pct) / 100); both operands non-negative
            ((i128::from(original) * pct) / 100) as i64
        }
        DiscountType::FreeAccess => original,
    };
    discount.clamp(0, original)
}

/// Reference to the code a quote was computed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCodeRef {
    pub id: PromoCodeId,
    pub code: PromoCodeName,
    /// The grant has no period end.
    #[serde(default)]
    pub unlimited: bool,
}

/// Result of pricing a plan, optionally with a promo code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub plan: Plan,
    pub original_price: i64,
    pub discount_amount: i64,
    pub final_price: i64,
    pub promo_code: Option<PromoCodeRef>,
}

impl PriceQuote {
    /// List price, no code applied.
    pub fn list_price(plan: Plan, original_price: i64) -> Self {
        Self::from_breakdown(plan, PriceBreakdown::full_price(original_price), None)
    }

    pub fn from_breakdown(
        plan: Plan,
        breakdown: PriceBreakdown,
        promo_code: Option<PromoCodeRef>,
    ) -> Self {
        Self {
            plan,
            original_price: breakdown.original_amount(),
            discount_amount: breakdown.discount_amount(),
            final_price: breakdown.final_amount(),
            promo_code,
        }
    }

    pub fn breakdown(&self) -> PriceBreakdown {
        PriceBreakdown::with_discount(self.original_price, self.discount_amount)
    }

    /// A zero-priced quote skips checkout entirely.
    pub fn is_free(&self) -> bool {
        self.final_price == 0
    }
}
