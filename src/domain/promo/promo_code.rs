//! PromoCode aggregate.
//!
//! A promo code owns its usage ledger (`used_by`). Pricing is a pure read;
//! the only mutation besides admin edits is [`PromoCode::redeem`], which
//! stores must run atomically against concurrent redeems of the same code.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PriceBreakdown, PromoCodeId, Timestamp, UserId, ValidationError};
use crate::domain::subscription::Plan;

use super::pricing::{formula_discount, DiscountType, PriceQuote, PromoCodeRef};
use super::{PromoCodeError, PromoCodeName, UnavailableReason};

/// Origin of a promo code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoCodeType {
    /// Negotiated code with a fixed final price.
    Preset,
    Custom,
    Generated,
    FullAccess,
}

impl PromoCodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoCodeType::Preset => "preset",
            PromoCodeType::Custom => "custom",
            PromoCodeType::Generated => "generated",
            PromoCodeType::FullAccess => "full_access",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preset" => Some(PromoCodeType::Preset),
            "custom" => Some(PromoCodeType::Custom),
            "generated" => Some(PromoCodeType::Generated),
            "full_access" => Some(PromoCodeType::FullAccess),
            _ => None,
        }
    }
}

/// Which plans a code may be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicablePlans {
    Monthly,
    Annual,
    #[default]
    Both,
}

impl ApplicablePlans {
    pub fn includes(&self, plan: Plan) -> bool {
        match (self, plan) {
            (_, Plan::Admin) => false,
            (ApplicablePlans::Both, _) => true,
            (ApplicablePlans::Monthly, Plan::Monthly) => true,
            (ApplicablePlans::Annual, Plan::Annual) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicablePlans::Monthly => "monthly",
            ApplicablePlans::Annual => "annual",
            ApplicablePlans::Both => "both",
        }
    }

    /// An empty value means unrestricted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(ApplicablePlans::Monthly),
            "annual" => Some(ApplicablePlans::Annual),
            "both" | "" => Some(ApplicablePlans::Both),
            _ => None,
        }
    }
}

/// One entry in a code's append-only usage ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub user_id: UserId,
    pub used_at: Timestamp,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
}

impl Redemption {
    pub fn new(user_id: UserId, breakdown: PriceBreakdown, used_at: Timestamp) -> Self {
        Self {
            user_id,
            used_at,
            original_amount: breakdown.original_amount(),
            discount_amount: breakdown.discount_amount(),
            final_amount: breakdown.final_amount(),
        }
    }

    pub fn amounts_consistent(&self) -> bool {
        PriceBreakdown::try_new(self.original_amount, self.discount_amount, self.final_amount)
            .is_ok()
    }
}

/// Parameters for creating a promo code.
#[derive(Debug, Clone)]
pub struct NewPromoCode {
    pub code: PromoCodeName,
    pub code_type: PromoCodeType,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub final_price: Option<i64>,
    pub max_uses: u32,
    pub valid_from: Timestamp,
    pub valid_until: Option<Timestamp>,
    pub applicable_plans: ApplicablePlans,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: PromoCodeName,
    pub code_type: PromoCodeType,
    pub discount_type: DiscountType,
    /// Cents for `fixed_amount`, percent for `percentage`, unused for `free_access`.
    pub discount_value: i64,
    /// Only honoured on `preset` codes.
    pub final_price: Option<i64>,
    pub max_uses: u32,
    pub current_uses: u32,
    pub valid_from: Timestamp,
    pub valid_until: Option<Timestamp>,
    pub applicable_plans: ApplicablePlans,
    pub is_active: bool,
    pub description: String,
    pub used_by: Vec<Redemption>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PromoCode {
    /// Creates an active, unused code.
    ///
    /// # Errors
    ///
    /// `ValidationError` for a negative discount, a percentage above 100,
    /// zero `max_uses`, an empty validity window, or a `final_price` on a
    /// non-preset code.
    pub fn create(params: NewPromoCode, now: Timestamp) -> Result<Self, ValidationError> {
        if params.discount_value < 0 {
            return Err(ValidationError::out_of_range(
                "discount_value",
                0,
                i64::MAX,
                params.discount_value,
            ));
        }
        if params.discount_type == DiscountType::Percentage && params.discount_value > 100 {
            return Err(ValidationError::out_of_range(
                "discount_value",
                0,
                100,
                params.discount_value,
            ));
        }
        if params.max_uses == 0 {
            return Err(ValidationError::out_of_range("max_uses", 1, i64::from(u32::MAX), 0));
        }
        if let Some(until) = params.valid_until {
            if !until.is_after(&params.valid_from) {
                return Err(ValidationError::invalid_format(
                    "valid_until",
                    "must be after valid_from",
                ));
            }
        }
        match (params.code_type, params.final_price) {
            (PromoCodeType::Preset, Some(price)) if price < 0 => {
                return Err(ValidationError::out_of_range("final_price", 0, i64::MAX, price));
            }
            (PromoCodeType::Preset, _) | (_, None) => {}
            (_, Some(_)) => {
                return Err(ValidationError::invalid_format(
                    "final_price",
                    "only preset codes carry a final price",
                ));
            }
        }

        Ok(Self {
            id: PromoCodeId::new(),
            code: params.code,
            code_type: params.code_type,
            discount_type: params.discount_type,
            discount_value: params.discount_value,
            final_price: params.final_price,
            max_uses: params.max_uses,
            current_uses: 0,
            valid_from: params.valid_from,
            valid_until: params.valid_until,
            applicable_plans: params.applicable_plans,
            is_active: true,
            description: params.description,
            used_by: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// First reason the code cannot be used at `now`, if any.
    pub fn unavailable_reason(&self, now: Timestamp) -> Option<UnavailableReason> {
        if !self.is_active {
            Some(UnavailableReason::Inactive)
        } else if now.is_before(&self.valid_from) {
            Some(UnavailableReason::NotYetValid)
        } else if self.valid_until.is_some_and(|until| now.is_after(&until)) {
            Some(UnavailableReason::Expired)
        } else if self.current_uses >= self.max_uses {
            Some(UnavailableReason::Exhausted)
        } else {
            None
        }
    }

    pub fn is_available(&self, now: Timestamp) -> bool {
        self.unavailable_reason(now).is_none()
    }

    pub fn applies_to(&self, plan: Plan) -> bool {
        self.applicable_plans.includes(plan)
    }

    pub fn remaining_uses(&self) -> u32 {
        self.max_uses.saturating_sub(self.current_uses)
    }

    pub fn has_been_used_by(&self, user_id: &UserId) -> bool {
        self.used_by.iter().any(|r| &r.user_id == user_id)
    }

    /// Breakdown of `original` under this code, ignoring availability.
    ///
    /// A preset's `final_price` takes precedence over the discount formula.
    pub fn breakdown_for(&self, original: i64) -> PriceBreakdown {
        match (self.code_type, self.final_price) {
            (PromoCodeType::Preset, Some(final_price)) => {
                PriceBreakdown::with_discount(original, original - final_price.min(original))
            }
            _ => PriceBreakdown::with_discount(
                original,
                formula_discount(self.discount_type, self.discount_value, original),
            ),
        }
    }

    /// Prices `plan` at list price `original`. Pure read.
    ///
    /// # Errors
    ///
    /// - `InvalidPromoCode` when inactive, outside its window or exhausted
    /// - `PlanNotApplicable` when the plan is excluded
    pub fn quote(
        &self,
        plan: Plan,
        original: i64,
        now: Timestamp,
    ) -> Result<PriceQuote, PromoCodeError> {
        if let Some(reason) = self.unavailable_reason(now) {
            return Err(PromoCodeError::unavailable(self.code.as_str(), reason));
        }
        if !self.applies_to(plan) {
            return Err(PromoCodeError::PlanNotApplicable {
                code: self.code.to_string(),
                plan,
            });
        }
        Ok(PriceQuote::from_breakdown(
            plan,
            self.breakdown_for(original),
            Some(self.reference()),
        ))
    }

    pub fn reference(&self) -> PromoCodeRef {
        PromoCodeRef {
            id: self.id,
            code: self.code.clone(),
            unlimited: self.grants_unlimited_access(),
        }
    }

    /// Full-access and free-access codes grant access that never expires.
    pub fn grants_unlimited_access(&self) -> bool {
        self.code_type == PromoCodeType::FullAccess || self.discount_type == DiscountType::FreeAccess
    }

    /// Records one use of the code.
    ///
    /// Validity window and active flag are not rechecked: redemption happens
    /// after payment, and a code that lapsed in between is still honoured.
    ///
    /// # Errors
    ///
    /// - `InvariantViolation` if the amounts do not add up or the ledger is
    ///   already inconsistent
    /// - `AlreadyUsedByUser` if the user is in `used_by`
    /// - `Exhausted` if `current_uses == max_uses`
    pub fn redeem(&mut self, redemption: Redemption) -> Result<(), PromoCodeError> {
        if !redemption.amounts_consistent() {
            return Err(PromoCodeError::InvariantViolation(format!(
                "redemption of {} for user {} has inconsistent amounts ({} - {} != {})",
                self.code,
                redemption.user_id,
                redemption.original_amount,
                redemption.discount_amount,
                redemption.final_amount
            )));
        }
        self.check_ledger()?;
        if self.has_been_used_by(&redemption.user_id) {
            return Err(PromoCodeError::AlreadyUsedByUser {
                code: self.code.to_string(),
                user_id: redemption.user_id,
            });
        }
        if self.current_uses >= self.max_uses {
            return Err(PromoCodeError::Exhausted {
                code: self.code.to_string(),
            });
        }

        self.updated_at = redemption.used_at;
        self.used_by.push(redemption);
        self.current_uses += 1;
        Ok(())
    }

    /// Verifies `current_uses == len(used_by) <= max_uses`.
    pub fn check_ledger(&self) -> Result<(), PromoCodeError> {
        if self.current_uses as usize != self.used_by.len() {
            return Err(PromoCodeError::InvariantViolation(format!(
                "{} has current_uses {} but {} ledger entries",
                self.code,
                self.current_uses,
                self.used_by.len()
            )));
        }
        if self.current_uses > self.max_uses {
            return Err(PromoCodeError::InvariantViolation(format!(
                "{} has current_uses {} above max_uses {}",
                self.code, self.current_uses, self.max_uses
            )));
        }
        Ok(())
    }

    // Admin edits. Usage counters are never touched here.

    pub fn set_active(&mut self, is_active: bool, now: Timestamp) {
        self.is_active = is_active;
        self.updated_at = now;
    }

    /// # Errors
    ///
    /// `InvariantViolation` when lowering the cap below uses already made.
    pub fn set_max_uses(&mut self, max_uses: u32, now: Timestamp) -> Result<(), PromoCodeError> {
        if max_uses < self.current_uses {
            return Err(PromoCodeError::InvariantViolation(format!(
                "cannot lower max_uses of {} to {} below current_uses {}",
                self.code, max_uses, self.current_uses
            )));
        }
        self.max_uses = max_uses;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_valid_until(&mut self, valid_until: Option<Timestamp>, now: Timestamp) {
        self.valid_until = valid_until;
        self.updated_at = now;
    }
}
