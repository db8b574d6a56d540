//! GrantAdminAccessHandler - Command handler for permanent admin access.
//!
//! Creates the subscription if the user has none. Admin access never
//! expires and provider events cannot overwrite it.

use std::sync::Arc;

use crate::domain::audit::AuditAction;
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::SubscriptionError;
use crate::ports::{AuditLog, SubscriptionRepository, UserRepository};

use super::super::support::{mutate_user, upsert_subscription, Mutation};
use super::lifecycle::{record_change, LifecycleResult};

#[derive(Debug, Clone, Copy)]
pub struct GrantAdminAccessCommand {
    pub actor: UserId,
    pub user_id: UserId,
}

pub struct GrantAdminAccessHandler {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    audit: Arc<dyn AuditLog>,
}

impl GrantAdminAccessHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            users,
            subscriptions,
            audit,
        }
    }

    pub async fn handle(&self, cmd: GrantAdminAccessCommand) -> Result<LifecycleResult, SubscriptionError> {
        let now = Timestamp::now();

        // 1. The user must exist
        if self.users.find_by_id(&cmd.user_id).await?.is_none() {
            return Err(SubscriptionError::UserNotFound(cmd.user_id));
        }

        // 2. Grant on the subscription, creating it if needed
        let mutated = upsert_subscription(self.subscriptions.as_ref(), cmd.user_id, now, |sub| {
            sub.grant_admin_access(now);
            Ok::<_, SubscriptionError>(Mutation::Write(()))
        })
        .await?;

        // 3. Flag the user
        mutate_user(self.users.as_ref(), &cmd.user_id, |user| {
            if user.is_admin {
                return false;
            }
            user.promote_to_admin(now);
            true
        })
        .await?;

        record_change(
            self.users.as_ref(),
            self.subscriptions.as_ref(),
            self.audit.as_ref(),
            cmd.actor,
            AuditAction::GrantAdminAccess,
            mutated,
            now,
        )
        .await
    }
}
