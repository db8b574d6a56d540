//! Promo code repository port.
//!
//! # Atomic redemption
//!
//! `redeem` is the only operation that touches `current_uses` or `used_by`.
//! It must behave as a single conditional update: check the user is not in
//! the ledger, check `current_uses < max_uses`, append, increment. Two
//! concurrent redeems of a code with one remaining use yield exactly one
//! success and one `Exhausted`.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PromoCodeId};
use crate::domain::promo::{PromoCode, PromoCodeError, PromoCodeName, Redemption};

#[async_trait]
pub trait PromoCodeRepository: Send + Sync {
    /// Stores a new code.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the normalized code is taken
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, code: &PromoCode) -> Result<(), DomainError>;

    /// Persists admin edits (active flag, cap, window, description).
    ///
    /// Usage counters and the ledger are left as stored.
    ///
    /// # Errors
    ///
    /// - `PromoCodeNotFound` if the id is unknown
    /// - `InvariantViolation` if the new cap is below stored uses
    async fn update_details(&self, code: &PromoCode) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &PromoCodeId) -> Result<Option<PromoCode>, DomainError>;

    async fn find_by_code(&self, code: &PromoCodeName) -> Result<Option<PromoCode>, DomainError>;

    /// Atomically records one use and returns the updated code.
    ///
    /// # Errors
    ///
    /// - `InvalidPromoCode` (not found) if the id is unknown
    /// - `AlreadyUsedByUser`, `Exhausted`, `InvariantViolation` per
    ///   [`PromoCode::redeem`]
    /// - `Infrastructure` on persistence failure
    async fn redeem(
        &self,
        id: &PromoCodeId,
        redemption: Redemption,
    ) -> Result<PromoCode, PromoCodeError>;

    async fn list(&self) -> Result<Vec<PromoCode>, DomainError>;
}
