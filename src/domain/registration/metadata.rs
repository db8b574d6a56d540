//! Checkout session metadata.
//!
//! Everything needed to finish a purchase after the redirect travels inside
//! the provider session as flat string pairs. The webhook processor rebuilds
//! the purchase from this alone, so it never depends on ephemeral request
//! state or on the pending record still existing.

use std::collections::HashMap;
use thiserror::Error;

use crate::domain::foundation::{PendingRegistrationId, PriceBreakdown, UserId};
use crate::domain::promo::{PriceQuote, PromoCodeName};
use crate::domain::subscription::Plan;
use crate::domain::user::Email;

use super::PendingRegistration;

pub const METADATA_VERSION: &str = "1";

mod keys {
    pub const VERSION: &str = "metadata_version";
    pub const FLOW: &str = "flow";
    pub const PENDING_REGISTRATION_ID: &str = "pending_registration_id";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const PASSWORD_HASH: &str = "password_hash";
    pub const USER_ID: &str = "user_id";
    pub const PLAN: &str = "plan";
    pub const PROMO_CODE: &str = "promo_code";
    pub const ORIGINAL_AMOUNT: &str = "original_amount";
    pub const DISCOUNT_AMOUNT: &str = "discount_amount";
    pub const FINAL_AMOUNT: &str = "final_amount";
}

const FLOW_REGISTRATION: &str = "registration";
const FLOW_UPGRADE: &str = "upgrade";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("checkout metadata is missing '{0}'")]
    MissingKey(&'static str),

    #[error("checkout metadata '{key}' is invalid: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("checkout metadata has unknown flow '{0}'")]
    UnknownFlow(String),
}

/// Who the checkout is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutSubject {
    /// A new signup; the user is created when payment completes.
    Registration {
        pending_registration_id: PendingRegistrationId,
        name: String,
        email: Email,
        password_hash: String,
    },
    /// An existing user buying or upgrading a plan.
    ExistingUser { user_id: UserId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub subject: CheckoutSubject,
    pub plan: Plan,
    pub promo_code: Option<PromoCodeName>,
    pub breakdown: PriceBreakdown,
}

impl CheckoutMetadata {
    pub fn for_registration(pending: &PendingRegistration, quote: &PriceQuote) -> Self {
        Self {
            subject: CheckoutSubject::Registration {
                pending_registration_id: pending.id,
                name: pending.name.clone(),
                email: pending.email.clone(),
                password_hash: pending.password_hash.clone(),
            },
            plan: quote.plan,
            promo_code: quote.promo_code.as_ref().map(|r| r.code.clone()),
            breakdown: quote.breakdown(),
        }
    }

    pub fn for_existing_user(user_id: UserId, quote: &PriceQuote) -> Self {
        Self {
            subject: CheckoutSubject::ExistingUser { user_id },
            plan: quote.plan,
            promo_code: quote.promo_code.as_ref().map(|r| r.code.clone()),
            breakdown: quote.breakdown(),
        }
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        let mut put = |k: &str, v: String| {
            map.insert(k.to_string(), v);
        };

        put(keys::VERSION, METADATA_VERSION.to_string());
        match &self.subject {
            CheckoutSubject::Registration {
                pending_registration_id,
                name,
                email,
                password_hash,
            } => {
                put(keys::FLOW, FLOW_REGISTRATION.to_string());
                put(keys::PENDING_REGISTRATION_ID, pending_registration_id.to_string());
                put(keys::NAME, name.clone());
                put(keys::EMAIL, email.to_string());
                put(keys::PASSWORD_HASH, password_hash.clone());
            }
            CheckoutSubject::ExistingUser { user_id } => {
                put(keys::FLOW, FLOW_UPGRADE.to_string());
                put(keys::USER_ID, user_id.to_string());
            }
        }
        put(keys::PLAN, self.plan.to_string());
        if let Some(code) = &self.promo_code {
            put(keys::PROMO_CODE, code.to_string());
        }
        put(keys::ORIGINAL_AMOUNT, self.breakdown.original_amount().to_string());
        put(keys::DISCOUNT_AMOUNT, self.breakdown.discount_amount().to_string());
        put(keys::FINAL_AMOUNT, self.breakdown.final_amount().to_string());
        map
    }

    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, MetadataError> {
        let flow = required(map, keys::FLOW)?;
        let subject = match flow {
            FLOW_REGISTRATION => CheckoutSubject::Registration {
                pending_registration_id: parse(map, keys::PENDING_REGISTRATION_ID)?,
                name: required(map, keys::NAME)?.to_string(),
                email: Email::parse(required(map, keys::EMAIL)?).map_err(|e| {
                    MetadataError::InvalidValue {
                        key: keys::EMAIL,
                        reason: e.to_string(),
                    }
                })?,
                password_hash: required(map, keys::PASSWORD_HASH)?.to_string(),
            },
            FLOW_UPGRADE => CheckoutSubject::ExistingUser {
                user_id: parse(map, keys::USER_ID)?,
            },
            other => return Err(MetadataError::UnknownFlow(other.to_string())),
        };

        let plan: Plan = parse(map, keys::PLAN)?;
        let promo_code = match map.get(keys::PROMO_CODE).map(|s| s.trim()) {
            None | Some("") => None,
            Some(raw) => Some(PromoCodeName::try_new(raw).map_err(|e| {
                MetadataError::InvalidValue {
                    key: keys::PROMO_CODE,
                    reason: e.to_string(),
                }
            })?),
        };
        let breakdown = PriceBreakdown::try_new(
            parse(map, keys::ORIGINAL_AMOUNT)?,
            parse(map, keys::DISCOUNT_AMOUNT)?,
            parse(map, keys::FINAL_AMOUNT)?,
        )
        .map_err(|e| MetadataError::InvalidValue {
            key: keys::FINAL_AMOUNT,
            reason: e.to_string(),
        })?;

        Ok(Self {
            subject,
            plan,
            promo_code,
            breakdown,
        })
    }
}

fn required<'a>(map: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str, MetadataError> {
    map.get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(MetadataError::MissingKey(key))
}

fn parse<T>(map: &HashMap<String, String>, key: &'static str) -> Result<T, MetadataError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    required(map, key)?
        .parse()
        .map_err(|e: T::Err| MetadataError::InvalidValue {
            key,
            reason: e.to_string(),
        })
}
