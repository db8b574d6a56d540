//! In-memory PendingRegistrationRepository.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, PendingRegistrationId, Timestamp};
use crate::domain::registration::PendingRegistration;
use crate::domain::user::Email;
use crate::ports::PendingRegistrationRepository;

#[derive(Default)]
pub struct InMemoryPendingRegistrationRepository {
    records: RwLock<HashMap<PendingRegistrationId, PendingRegistration>>,
}

impl InMemoryPendingRegistrationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl PendingRegistrationRepository for InMemoryPendingRegistrationRepository {
    async fn insert(&self, pending: &PendingRegistration, now: Timestamp) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let existing: Vec<(PendingRegistrationId, bool)> = records
            .values()
            .filter(|r| r.email == pending.email)
            .map(|r| (r.id, r.is_expired(now)))
            .collect();

        if existing.iter().any(|(_, expired)| !expired) {
            return Err(DomainError::new(
                ErrorCode::EmailInUse,
                "A registration for this email is already in progress",
            )
            .with_detail("email", pending.email.as_str()));
        }
        for (id, _) in existing {
            records.remove(&id);
        }
        records.insert(pending.id, pending.clone());
        Ok(())
    }

    async fn update(&self, pending: &PendingRegistration) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        match records.get_mut(&pending.id) {
            Some(stored) => {
                *stored = pending.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::PendingRegistrationNotFound,
                format!("Pending registration not found: {}", pending.id),
            )),
        }
    }

    async fn find_by_id(
        &self,
        id: &PendingRegistrationId,
    ) -> Result<Option<PendingRegistration>, DomainError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<PendingRegistration>, DomainError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| &r.email == email)
            .cloned())
    }

    async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<PendingRegistration>, DomainError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.checkout_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn delete(&self, id: &PendingRegistrationId) -> Result<bool, DomainError> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}
