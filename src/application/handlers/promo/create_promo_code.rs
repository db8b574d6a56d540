//! CreatePromoCodeHandler - Command handler for admin-defined promo codes.

use std::sync::Arc;

use tracing::info;

use crate::domain::foundation::Timestamp;
use crate::domain::promo::{
    ApplicablePlans, DiscountType, NewPromoCode, PromoCode, PromoCodeError, PromoCodeName,
    PromoCodeType,
};
use crate::ports::PromoCodeRepository;

/// Command to create a promo code.
#[derive(Debug, Clone)]
pub struct CreatePromoCodeCommand {
    pub code: String,
    pub code_type: PromoCodeType,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub final_price: Option<i64>,
    pub max_uses: u32,
    /// Defaults to now.
    pub valid_from: Option<Timestamp>,
    pub valid_until: Option<Timestamp>,
    pub applicable_plans: ApplicablePlans,
    pub description: String,
}

pub struct CreatePromoCodeHandler {
    promo_codes: Arc<dyn PromoCodeRepository>,
}

impl CreatePromoCodeHandler {
    pub fn new(promo_codes: Arc<dyn PromoCodeRepository>) -> Self {
        Self { promo_codes }
    }

    pub async fn handle(&self, cmd: CreatePromoCodeCommand) -> Result<PromoCode, PromoCodeError> {
        let now = Timestamp::now();

        // 1. Normalize and validate
        let code = PromoCode::create(
            NewPromoCode {
                code: PromoCodeName::try_new(&cmd.code)?,
                code_type: cmd.code_type,
                discount_type: cmd.discount_type,
                discount_value: cmd.discount_value,
                final_price: cmd.final_price,
                max_uses: cmd.max_uses,
                valid_from: cmd.valid_from.unwrap_or(now),
                valid_until: cmd.valid_until,
                applicable_plans: cmd.applicable_plans,
                description: cmd.description,
            },
            now,
        )?;

        // 2. Persist; the store enforces code uniqueness
        self.promo_codes.insert(&code).await?;

        info!(
            promo_code = %code.code,
            code_type = code.code_type.as_str(),
            max_uses = code.max_uses,
            "promo code created"
        );
        Ok(code)
    }
}
