//! In-memory PromoCodeRepository.
//!
//! `redeem` runs the domain check and the append under one write lock,
//! which gives the same all-or-nothing behaviour as the conditional update
//! in the PostgreSQL adapter.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, PromoCodeId};
use crate::domain::promo::{PromoCode, PromoCodeError, PromoCodeName, Redemption};
use crate::ports::PromoCodeRepository;

#[derive(Default)]
pub struct InMemoryPromoCodeRepository {
    codes: RwLock<HashMap<PromoCodeId, PromoCode>>,
}

impl InMemoryPromoCodeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromoCodeRepository for InMemoryPromoCodeRepository {
    async fn insert(&self, code: &PromoCode) -> Result<(), DomainError> {
        let mut codes = self.codes.write().await;
        if codes.values().any(|c| c.code == code.code) {
            return Err(DomainError::already_exists(format!(
                "Promo code {} already exists",
                code.code
            ))
            .with_detail("code", code.code.as_str()));
        }
        codes.insert(code.id, code.clone());
        Ok(())
    }

    async fn update_details(&self, code: &PromoCode) -> Result<(), DomainError> {
        let mut codes = self.codes.write().await;
        let stored = codes.get_mut(&code.id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::PromoCodeNotFound,
                format!("Promo code not found: {}", code.id),
            )
        })?;
        if code.max_uses < stored.current_uses {
            return Err(DomainError::new(
                ErrorCode::InvariantViolation,
                format!(
                    "max_uses {} is below current_uses {} for {}",
                    code.max_uses, stored.current_uses, stored.code
                ),
            ));
        }
        stored.is_active = code.is_active;
        stored.max_uses = code.max_uses;
        stored.valid_from = code.valid_from;
        stored.valid_until = code.valid_until;
        stored.applicable_plans = code.applicable_plans;
        stored.description = code.description.clone();
        stored.updated_at = code.updated_at;
        Ok(())
    }

    async fn find_by_id(&self, id: &PromoCodeId) -> Result<Option<PromoCode>, DomainError> {
        Ok(self.codes.read().await.get(id).cloned())
    }

    async fn find_by_code(&self, code: &PromoCodeName) -> Result<Option<PromoCode>, DomainError> {
        Ok(self
            .codes
            .read()
            .await
            .values()
            .find(|c| &c.code == code)
            .cloned())
    }

    async fn redeem(
        &self,
        id: &PromoCodeId,
        redemption: Redemption,
    ) -> Result<PromoCode, PromoCodeError> {
        let mut codes = self.codes.write().await;
        let stored = codes
            .get_mut(id)
            .ok_or_else(|| PromoCodeError::not_found(id.to_string()))?;

        // Work on a copy so a rejected redeem leaves the stored code untouched.
        let mut candidate = stored.clone();
        candidate.redeem(redemption)?;
        *stored = candidate.clone();
        Ok(candidate)
    }

    async fn list(&self) -> Result<Vec<PromoCode>, DomainError> {
        let mut all: Vec<PromoCode> = self.codes.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{PriceBreakdown, Timestamp, UserId};
    use crate::domain::promo::{ApplicablePlans, DiscountType, NewPromoCode, PromoCodeType};

    fn code(name: &str, max_uses: u32) -> PromoCode {
        PromoCode::create(
            NewPromoCode {
                code: PromoCodeName::try_new(name).unwrap(),
                code_type: PromoCodeType::Custom,
                discount_type: DiscountType::Percentage,
                discount_value: 50,
                final_price: None,
                max_uses,
                valid_from: Timestamp::now().add_days(-1),
                valid_until: None,
                applicable_plans: ApplicablePlans::Both,
                description: String::new(),
            },
            Timestamp::now(),
        )
        .unwrap()
    }

    fn redemption(user_id: UserId) -> Redemption {
        Redemption::new(
            user_id,
            PriceBreakdown::with_discount(3900, 1950),
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let repo = InMemoryPromoCodeRepository::new();
        repo.insert(&code("HALF", 5)).await.unwrap();

        let err = repo.insert(&code("half", 5)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn redeem_persists_ledger_entry() {
        let repo = InMemoryPromoCodeRepository::new();
        let promo = code("HALF", 5);
        repo.insert(&promo).await.unwrap();

        let updated = repo.redeem(&promo.id, redemption(UserId::new())).await.unwrap();
        assert_eq!(updated.current_uses, 1);

        let stored = repo.find_by_id(&promo.id).await.unwrap().unwrap();
        assert_eq!(stored.used_by.len(), 1);
    }

    #[tokio::test]
    async fn rejected_redeem_leaves_code_untouched() {
        let repo = InMemoryPromoCodeRepository::new();
        let promo = code("ONCE", 1);
        repo.insert(&promo).await.unwrap();
        repo.redeem(&promo.id, redemption(UserId::new())).await.unwrap();

        let err = repo.redeem(&promo.id, redemption(UserId::new())).await.unwrap_err();
        assert!(matches!(err, PromoCodeError::Exhausted { .. }));

        let stored = repo.find_by_id(&promo.id).await.unwrap().unwrap();
        assert_eq!(stored.current_uses, 1);
        assert_eq!(stored.used_by.len(), 1);
    }

    #[tokio::test]
    async fn update_details_cannot_lower_cap_below_uses() {
        let repo = InMemoryPromoCodeRepository::new();
        let promo = code("TWICE", 2);
        repo.insert(&promo).await.unwrap();
        repo.redeem(&promo.id, redemption(UserId::new())).await.unwrap();
        repo.redeem(&promo.id, redemption(UserId::new())).await.unwrap();

        let mut edited = promo.clone();
        edited.max_uses = 1;
        let err = repo.update_details(&edited).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvariantViolation);
    }

    #[tokio::test]
    async fn update_details_keeps_stored_ledger() {
        let repo = InMemoryPromoCodeRepository::new();
        let promo = code("KEEP", 3);
        repo.insert(&promo).await.unwrap();
        repo.redeem(&promo.id, redemption(UserId::new())).await.unwrap();

        let mut edited = promo.clone();
        edited.set_active(false, Timestamp::now());
        repo.update_details(&edited).await.unwrap();

        let stored = repo.find_by_id(&promo.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.current_uses, 1);
    }
}
