//! Append-only audit log port.

use async_trait::async_trait;

use crate::domain::audit::AuditEntry;
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), DomainError>;

    /// Entries targeting the user, oldest first.
    async fn entries_for_user(&self, user_id: &UserId) -> Result<Vec<AuditEntry>, DomainError>;
}
