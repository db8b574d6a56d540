//! UpdatePromoCodeHandler - Command handler for admin edits to a promo code.
//!
//! Usage counters and the redemption ledger are never touched here.

use std::sync::Arc;

use tracing::info;

use crate::domain::foundation::Timestamp;
use crate::domain::promo::{PromoCode, PromoCodeError, PromoCodeName};
use crate::ports::PromoCodeRepository;

/// Command to edit a code. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdatePromoCodeCommand {
    pub code: String,
    pub is_active: Option<bool>,
    pub max_uses: Option<u32>,
    /// `Some(None)` removes the end of the validity window.
    pub valid_until: Option<Option<Timestamp>>,
    pub description: Option<String>,
}

pub struct UpdatePromoCodeHandler {
    promo_codes: Arc<dyn PromoCodeRepository>,
}

impl UpdatePromoCodeHandler {
    pub fn new(promo_codes: Arc<dyn PromoCodeRepository>) -> Self {
        Self { promo_codes }
    }

    pub async fn handle(&self, cmd: UpdatePromoCodeCommand) -> Result<PromoCode, PromoCodeError> {
        let now = Timestamp::now();
        let name = PromoCodeName::try_new(&cmd.code)?;

        // 1. Load
        let mut code = self
            .promo_codes
            .find_by_code(&name)
            .await?
            .ok_or_else(|| PromoCodeError::not_found(name.as_str()))?;

        // 2. Apply edits
        if let Some(is_active) = cmd.is_active {
            code.set_active(is_active, now);
        }
        if let Some(max_uses) = cmd.max_uses {
            code.set_max_uses(max_uses, now)?;
        }
        if let Some(valid_until) = cmd.valid_until {
            code.set_valid_until(valid_until, now);
        }
        if let Some(description) = cmd.description {
            code.description = description;
            code.updated_at = now;
        }

        // 3. Persist; the store rechecks the cap against live usage
        self.promo_codes.update_details(&code).await?;

        info!(
            promo_code = %code.code,
            is_active = code.is_active,
            max_uses = code.max_uses,
            "promo code updated"
        );
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::fixtures::{self, Stores};
    use crate::domain::foundation::{PriceBreakdown, UserId};
    use crate::domain::promo::{DiscountType, Redemption};
    use crate::domain::subscription::Plan;

    #[tokio::test]
    async fn deactivated_code_no_longer_prices() {
        let stores = Stores::new();
        stores
            .add_code(fixtures::custom_code("SPRING", DiscountType::FixedAmount, 500, 10))
            .await;
        let handler = UpdatePromoCodeHandler::new(stores.promo_codes.clone());

        let code = handler
            .handle(UpdatePromoCodeCommand {
                code: "spring".to_string(),
                is_active: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!code.is_active);
        assert!(code.quote(Plan::Monthly, 3900, Timestamp::now()).is_err());
    }

    #[tokio::test]
    async fn cap_below_current_uses_is_rejected() {
        let stores = Stores::new();
        let code = stores
            .add_code(fixtures::custom_code("SPRING", DiscountType::FixedAmount, 500, 10))
            .await;
        for _ in 0..3 {
            stores
                .promo_codes
                .redeem(
                    &code.id,
                    Redemption::new(UserId::new(), PriceBreakdown::with_discount(3900, 500), Timestamp::now()),
                )
                .await
                .unwrap();
        }
        let handler = UpdatePromoCodeHandler::new(stores.promo_codes.clone());

        let result = handler
            .handle(UpdatePromoCodeCommand {
                code: "SPRING".to_string(),
                max_uses: Some(2),
                ..Default::default()
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn edits_leave_usage_alone() {
        let stores = Stores::new();
        let code = stores
            .add_code(fixtures::custom_code("SPRING", DiscountType::FixedAmount, 500, 10))
            .await;
        stores
            .promo_codes
            .redeem(
                &code.id,
                Redemption::new(UserId::new(), PriceBreakdown::with_discount(3900, 500), Timestamp::now()),
            )
            .await
            .unwrap();
        let handler = UpdatePromoCodeHandler::new(stores.promo_codes.clone());

        handler
            .handle(UpdatePromoCodeCommand {
                code: "SPRING".to_string(),
                max_uses: Some(20),
                description: Some("Extended".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let stored = stores.promo_codes.find_by_id(&code.id).await.unwrap().unwrap();
        assert_eq!(stored.max_uses, 20);
        assert_eq!(stored.current_uses, 1);
        assert_eq!(stored.used_by.len(), 1);
        assert_eq!(stored.description, "Extended");
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let stores = Stores::new();
        let handler = UpdatePromoCodeHandler::new(stores.promo_codes.clone());

        let err = handler
            .handle(UpdatePromoCodeCommand {
                code: "MISSING".to_string(),
                is_active: Some(false),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err, PromoCodeError::not_found("MISSING"));
    }
}
