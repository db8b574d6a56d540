//! In-memory UserRepository.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::user::{Email, User};
use crate::ports::UserRepository;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All users, oldest first.
    pub async fn all(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        users
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: &User) -> Result<(), DomainError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(DomainError::new(ErrorCode::EmailInUse, "Email is already registered")
                .with_detail("email", user.email.as_str()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&user.id).ok_or_else(|| {
            DomainError::new(ErrorCode::UserNotFound, format!("User not found: {}", user.id))
        })?;
        if stored.version != user.version {
            return Err(DomainError::concurrent_modification(format!(
                "user {} is at version {}, update was based on {}",
                user.id, stored.version, user.version
            ))
            .with_detail("user_id", user.id.to_string()));
        }

        let mut next = user.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, DomainError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::user::NewUser;

    fn user(email: &str) -> User {
        User::register(
            NewUser {
                name: "Ada".to_string(),
                email: Email::parse(email).unwrap(),
                password_hash: "hash".to_string(),
                is_verified: false,
                registration_promo_code: None,
            },
            Timestamp::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn email_is_unique() {
        let repo = InMemoryUserRepository::new();
        repo.insert(&user("ada@example.com")).await.unwrap();

        let err = repo.insert(&user("ada@example.com")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EmailInUse);
        assert_eq!(err.details.get("email").map(String::as_str), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn update_from_stale_copy_is_rejected() {
        let repo = InMemoryUserRepository::new();
        let original = user("ada@example.com");
        repo.insert(&original).await.unwrap();

        let mut admin = original.clone();
        admin.promote_to_admin(Timestamp::now());
        let stored = repo.update(&admin).await.unwrap();
        assert_eq!(stored.version, 1);

        let mut stale = original;
        stale.mark_verified(Timestamp::now());
        let err = repo.update(&stale).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConcurrentModification);
        assert!(repo.find_by_id(&admin.id).await.unwrap().unwrap().is_admin);
    }

    #[tokio::test]
    async fn update_requires_existing_user() {
        let repo = InMemoryUserRepository::new();
        let err = repo.update(&user("ada@example.com")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UserNotFound);
    }
}
