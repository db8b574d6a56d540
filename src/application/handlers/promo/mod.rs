//! Promo code handlers.
//!
//! ## Commands
//! - Redeeming a code once payment is confirmed
//! - Creating and editing codes (admin)
//! - Seeding preset codes at startup
//!
//! ## Queries
//! - Pricing a plan with an optional code

mod create_promo_code;
mod price_plan;
mod redeem_promo_code;
mod seed_preset_promo_codes;
mod update_promo_code;

pub(crate) use price_plan::{parse_code, quote_plan};

// Commands
pub use create_promo_code::{CreatePromoCodeCommand, CreatePromoCodeHandler};
pub use redeem_promo_code::{RedeemPromoCodeCommand, RedeemPromoCodeHandler};
pub use seed_preset_promo_codes::{
    SeedPresetPromoCodesCommand, SeedPresetPromoCodesHandler, SeedPresetPromoCodesResult,
};
pub use update_promo_code::{UpdatePromoCodeCommand, UpdatePromoCodeHandler};

// Queries
pub use price_plan::{PricePlanHandler, PricePlanQuery};
