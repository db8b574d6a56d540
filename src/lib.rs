//! Entitlement Engine - paid access driven by checkout, promo codes and
//! payment provider webhooks.
//!
//! Prices plans (with optional promo codes), holds signups while the user is
//! at checkout, reconciles subscriptions from provider webhooks, applies
//! administrative overrides, and answers "does this user have premium
//! access?".

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
