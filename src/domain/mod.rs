//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, money, errors)
//! - `promo` - Promo codes, discount pricing and the usage ledger
//! - `registration` - Pending registrations and checkout metadata
//! - `subscription` - Plans, statuses and the Subscription aggregate
//! - `user` - Users and their cached entitlement view
//! - `payment` - Payment ledger entries and refunds
//! - `entitlement` - The premium access decision
//! - `webhook` - Provider events, signatures and processing outcomes
//! - `audit` - Records of administrative changes

pub mod audit;
pub mod entitlement;
pub mod foundation;
pub mod payment;
pub mod promo;
pub mod registration;
pub mod subscription;
pub mod user;
pub mod webhook;
