//! RedeemPromoCodeHandler - Command handler for recording one use of a promo code.

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::promo::{PromoCode, PromoCodeError, PromoCodeRef, Redemption};
use crate::ports::PromoCodeRepository;

/// Command to redeem a priced code for a user.
///
/// Amounts are the ones the quote produced; they must add up.
#[derive(Debug, Clone)]
pub struct RedeemPromoCodeCommand {
    pub promo_code: PromoCodeRef,
    pub user_id: UserId,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
}

/// Handler for promo code redemption.
///
/// Not idempotent: a retry for the same user fails with `AlreadyUsedByUser`.
pub struct RedeemPromoCodeHandler {
    promo_codes: Arc<dyn PromoCodeRepository>,
}

impl RedeemPromoCodeHandler {
    pub fn new(promo_codes: Arc<dyn PromoCodeRepository>) -> Self {
        Self { promo_codes }
    }

    pub async fn handle(&self, cmd: RedeemPromoCodeCommand) -> Result<PromoCode, PromoCodeError> {
        let redemption = Redemption {
            user_id: cmd.user_id,
            used_at: Timestamp::now(),
            original_amount: cmd.original_amount,
            discount_amount: cmd.discount_amount,
            final_amount: cmd.final_amount,
        };

        match self.promo_codes.redeem(&cmd.promo_code.id, redemption).await {
            Ok(code) => {
                info!(
                    promo_code = %code.code,
                    user_id = %cmd.user_id,
                    current_uses = code.current_uses,
                    max_uses = code.max_uses,
                    "promo code redeemed"
                );
                Ok(code)
            }
            Err(err @ PromoCodeError::InvariantViolation(_)) => {
                error!(
                    promo_code = %cmd.promo_code.code,
                    user_id = %cmd.user_id,
                    error = %err,
                    "promo code redemption aborted"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}
