//! PricePlanHandler - Query handler for pricing a plan with an optional promo code.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId, ValidationError};
use crate::domain::promo::{PriceQuote, PromoCodeError, PromoCodeName};
use crate::domain::subscription::{Plan, PlanPricing};
use crate::ports::PromoCodeRepository;

/// Query to price a plan.
#[derive(Debug, Clone)]
pub struct PricePlanQuery {
    pub plan: Plan,
    /// Raw code as typed; blank means no code.
    pub promo_code: Option<String>,
    /// When known, a code this user already redeemed is rejected up front.
    pub user_id: Option<UserId>,
}

/// Handler for pricing plans. Pure read; nothing is reserved.
pub struct PricePlanHandler {
    promo_codes: Arc<dyn PromoCodeRepository>,
    pricing: PlanPricing,
}

impl PricePlanHandler {
    pub fn new(promo_codes: Arc<dyn PromoCodeRepository>, pricing: PlanPricing) -> Self {
        Self {
            promo_codes,
            pricing,
        }
    }

    pub async fn handle(&self, query: PricePlanQuery) -> Result<PriceQuote, PromoCodeError> {
        let code = parse_code(query.promo_code.as_deref())?;
        quote_plan(
            self.promo_codes.as_ref(),
            &self.pricing,
            query.plan,
            code.as_ref(),
            query.user_id.as_ref(),
            Timestamp::now(),
        )
        .await
    }
}

/// Normalizes a user-typed code. Blank input means no code.
pub(crate) fn parse_code(raw: Option<&str>) -> Result<Option<PromoCodeName>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => PromoCodeName::try_new(raw).map(Some),
    }
}

/// Prices `plan` at its canonical price, applying `code` when given.
pub(crate) async fn quote_plan(
    promo_codes: &dyn PromoCodeRepository,
    pricing: &PlanPricing,
    plan: Plan,
    code: Option<&PromoCodeName>,
    user_id: Option<&UserId>,
    now: Timestamp,
) -> Result<PriceQuote, PromoCodeError> {
    if !plan.is_purchasable() {
        return Err(ValidationError::invalid_format("plan", format!("{} cannot be purchased", plan)).into());
    }
    let original = pricing.price_for(plan);

    let Some(code) = code else {
        return Ok(PriceQuote::list_price(plan, original));
    };

    let promo = promo_codes
        .find_by_code(code)
        .await?
        .ok_or_else(|| PromoCodeError::not_found(code.as_str()))?;

    if let Some(user_id) = user_id {
        if promo.has_been_used_by(user_id) {
            return Err(PromoCodeError::AlreadyUsedByUser {
                code: promo.code.to_string(),
                user_id: *user_id,
            });
        }
    }

    promo.quote(plan, original, now)
}
