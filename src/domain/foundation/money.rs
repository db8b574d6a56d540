//! Integer-cent price breakdowns.

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Original price, discount and amount actually charged, in cents.
///
/// Always satisfies `discount_amount + final_amount == original_amount`
/// with every component non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceBreakdown {
    original_amount: i64,
    discount_amount: i64,
    final_amount: i64,
}

impl PriceBreakdown {
    /// Builds a breakdown from three caller-supplied amounts.
    ///
    /// # Errors
    ///
    /// `ValidationError` if any amount is negative or the three do not add up.
    pub fn try_new(
        original_amount: i64,
        discount_amount: i64,
        final_amount: i64,
    ) -> Result<Self, ValidationError> {
        for (field, value) in [
            ("original_amount", original_amount),
            ("discount_amount", discount_amount),
            ("final_amount", final_amount),
        ] {
            if value < 0 {
                return Err(ValidationError::out_of_range(field, 0, i64::MAX, value));
            }
        }
        if discount_amount.checked_add(final_amount) != Some(original_amount) {
            return Err(ValidationError::invalid_format(
                "price_breakdown",
                format!(
                    "discount {} + final {} != original {}",
                    discount_amount, final_amount, original_amount
                ),
            ));
        }
        Ok(Self {
            original_amount,
            discount_amount,
            final_amount,
        })
    }

    /// Derives the breakdown from an original price and a discount,
    /// capping the discount at the original price.
    pub fn with_discount(original_amount: i64, discount_amount: i64) -> Self {
        let original_amount = original_amount.max(0);
        let discount_amount = discount_amount.clamp(0, original_amount);
        Self {
            original_amount,
            discount_amount,
            final_amount: original_amount - discount_amount,
        }
    }

    pub fn full_price(original_amount: i64) -> Self {
        Self::with_discount(original_amount, 0)
    }

    /// Entire price waived.
    pub fn fully_discounted(original_amount: i64) -> Self {
        Self::with_discount(original_amount, original_amount)
    }

    pub fn zero() -> Self {
        Self::full_price(0)
    }

    pub fn original_amount(&self) -> i64 {
        self.original_amount
    }

    pub fn discount_amount(&self) -> i64 {
        self.discount_amount
    }

    pub fn final_amount(&self) -> i64 {
        self.final_amount
    }

    pub fn is_free(&self) -> bool {
        self.final_amount == 0
    }
}
