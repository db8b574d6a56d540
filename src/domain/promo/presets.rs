//! Built-in preset codes seeded at startup.

use crate::domain::foundation::{Timestamp, ValidationError};

use super::{ApplicablePlans, DiscountType, NewPromoCode, PromoCodeName, PromoCodeType};

/// A negotiated preset: fixed final price on the listed plans.
#[derive(Debug, Clone, Copy)]
pub struct PresetDefinition {
    pub code: &'static str,
    pub discount_value: i64,
    pub final_price: i64,
    pub applicable_plans: ApplicablePlans,
    pub max_uses: u32,
    pub description: &'static str,
}

pub const DEFAULT_PRESETS: &[PresetDefinition] = &[PresetDefinition {
    code: "FRIENDSFAMILY",
    discount_value: 1400,
    final_price: 1500,
    applicable_plans: ApplicablePlans::Monthly,
    max_uses: 1000,
    description: "Friends and family monthly rate",
}];

impl PresetDefinition {
    pub fn to_new_promo_code(&self, now: Timestamp) -> Result<NewPromoCode, ValidationError> {
        Ok(NewPromoCode {
            code: PromoCodeName::try_new(self.code)?,
            code_type: PromoCodeType::Preset,
            discount_type: DiscountType::FixedAmount,
            discount_value: self.discount_value,
            final_price: Some(self.final_price),
            max_uses: self.max_uses,
            valid_from: now,
            valid_until: None,
            applicable_plans: self.applicable_plans,
            description: self.description.to_string(),
        })
    }
}
