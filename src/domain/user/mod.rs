//! Users and their cached entitlement view.

mod account;
mod email;

pub use account::{NewUser, User};
pub use email::Email;
