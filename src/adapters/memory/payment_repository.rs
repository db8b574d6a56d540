//! In-memory PaymentRepository keyed by external charge id.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::payment::Payment;
use crate::ports::{PaymentRepository, SaveResult};

#[derive(Default)]
pub struct InMemoryPaymentRepository {
    by_charge_id: RwLock<HashMap<String, Payment>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.by_charge_id.read().await.len()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<SaveResult, DomainError> {
        let mut payments = self.by_charge_id.write().await;
        if payments.contains_key(&payment.external_charge_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        payments.insert(payment.external_charge_id.clone(), payment.clone());
        Ok(SaveResult::Inserted)
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut payments = self.by_charge_id.write().await;
        match payments.get_mut(&payment.external_charge_id) {
            Some(stored) if stored.id == payment.id => {
                *stored = payment.clone();
                Ok(())
            }
            _ => Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment not found: {}", payment.id),
            )),
        }
    }

    async fn find_by_external_charge_id(
        &self,
        external_charge_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self.by_charge_id.read().await.get(external_charge_id).cloned())
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .by_charge_id
            .read()
            .await
            .values()
            .find(|p| p.payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Payment>, DomainError> {
        let mut payments: Vec<Payment> = self
            .by_charge_id
            .read()
            .await
            .values()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{PriceBreakdown, Timestamp};
    use crate::domain::payment::{NewPayment, PaymentSource};

    fn payment(charge_id: &str, user_id: UserId) -> Payment {
        Payment::succeeded(
            NewPayment {
                user_id,
                subscription_id: None,
                external_charge_id: charge_id.to_string(),
                payment_intent_id: Some(format!("pi_{}", charge_id)),
                currency: "usd".to_string(),
                payment_method: None,
                source: PaymentSource::Checkout,
                promo_code: None,
                breakdown: PriceBreakdown::full_price(3900),
            },
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn second_insert_with_same_charge_id_reports_existing() {
        let repo = InMemoryPaymentRepository::new();
        let user_id = UserId::new();

        assert_eq!(repo.insert(&payment("cs_1", user_id)).await.unwrap(), SaveResult::Inserted);
        assert_eq!(
            repo.insert(&payment("cs_1", user_id)).await.unwrap(),
            SaveResult::AlreadyExists
        );
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn finds_by_payment_intent() {
        let repo = InMemoryPaymentRepository::new();
        repo.insert(&payment("in_1", UserId::new())).await.unwrap();

        let found = repo.find_by_payment_intent_id("pi_in_1").await.unwrap();
        assert_eq!(found.map(|p| p.external_charge_id), Some("in_1".to_string()));
    }

    #[tokio::test]
    async fn lists_only_the_users_payments() {
        let repo = InMemoryPaymentRepository::new();
        let user_id = UserId::new();
        repo.insert(&payment("in_1", user_id)).await.unwrap();
        repo.insert(&payment("in_2", user_id)).await.unwrap();
        repo.insert(&payment("in_3", UserId::new())).await.unwrap();

        assert_eq!(repo.list_for_user(&user_id).await.unwrap().len(), 2);
    }
}
