//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresPromoCodeRepository` - Codes and their redemption ledger,
//!   redeemed under a row lock
//! - `PostgresSubscriptionRepository` - Versioned compare-and-swap updates
//! - `PostgresPaymentRepository` - Payments keyed by external charge id
//!
//! The schema lives in `migrations/` and is applied by
//! [`DatabaseConfig::connect`](crate::config::DatabaseConfig::connect).

mod payment_repository;
mod promo_code_repository;
mod subscription_repository;

pub use payment_repository::PostgresPaymentRepository;
pub use promo_code_repository::PostgresPromoCodeRepository;
pub use subscription_repository::PostgresSubscriptionRepository;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Wraps a sqlx failure as a `DatabaseError` naming the operation.
fn db_error(operation: &str, err: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", operation, err))
}

/// True when `err` is a violation of the named unique constraint.
fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}

/// Parses a stored enum column, reporting the column on failure.
fn parse_column<T>(column: &str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T, DomainError> {
    parse(value).ok_or_else(|| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid {} value: {}", column, value),
        )
    })
}
