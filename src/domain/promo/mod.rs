//! Promo code engine: code validation, discount pricing and the usage ledger.

mod code;
mod errors;
mod presets;
mod pricing;
mod promo_code;

pub use code::PromoCodeName;
pub use errors::{PromoCodeError, UnavailableReason};
pub use presets::{PresetDefinition, DEFAULT_PRESETS};
pub use pricing::{formula_discount, DiscountType, PriceQuote, PromoCodeRef};
pub use promo_code::{
    ApplicablePlans, NewPromoCode, PromoCode, PromoCodeType, Redemption,
};
