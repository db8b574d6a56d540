//! Entitlement handlers.

mod check_premium_access;

pub use check_premium_access::{
    CheckPremiumAccessHandler, CheckPremiumAccessQuery, CheckPremiumAccessResult,
};
