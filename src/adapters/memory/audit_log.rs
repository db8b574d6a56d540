//! In-memory AuditLog.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::audit::AuditEntry;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::AuditLog;

#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<(), DomainError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn entries_for_user(&self, user_id: &UserId) -> Result<Vec<AuditEntry>, DomainError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| &e.target_user_id == user_id)
            .cloned()
            .collect())
    }
}
