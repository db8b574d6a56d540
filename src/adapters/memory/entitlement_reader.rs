//! In-memory EntitlementReader joining the user and subscription stores.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::DomainError;
use crate::ports::{AccountView, EntitlementReader};

use super::{InMemorySubscriptionRepository, InMemoryUserRepository};

pub struct InMemoryEntitlementReader {
    users: Arc<InMemoryUserRepository>,
    subscriptions: Arc<InMemorySubscriptionRepository>,
}

impl InMemoryEntitlementReader {
    pub fn new(
        users: Arc<InMemoryUserRepository>,
        subscriptions: Arc<InMemorySubscriptionRepository>,
    ) -> Self {
        Self {
            users,
            subscriptions,
        }
    }
}

#[async_trait]
impl EntitlementReader for InMemoryEntitlementReader {
    async fn list_accounts(&self) -> Result<Vec<AccountView>, DomainError> {
        let mut by_user: HashMap<_, _> = self
            .subscriptions
            .all()
            .await
            .into_iter()
            .map(|s| (s.user_id, s))
            .collect();

        Ok(self
            .users
            .all()
            .await
            .into_iter()
            .map(|user| AccountView {
                subscription: by_user.remove(&user.id),
                user,
            })
            .collect())
    }
}
