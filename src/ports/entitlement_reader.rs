//! Entitlement reader port (read side for scheduled queries).
//!
//! Backs the periodic jobs that look across all accounts. Kept apart from
//! the repositories so a deployment can point it at a replica or a
//! denormalized view.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::DomainError;
use crate::domain::subscription::Subscription;
use crate::domain::user::User;

/// A user together with their subscription, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub user: User,
    pub subscription: Option<Subscription>,
}

#[async_trait]
pub trait EntitlementReader: Send + Sync {
    /// Every user with their subscription. Ordered by user creation time.
    async fn list_accounts(&self) -> Result<Vec<AccountView>, DomainError>;
}
