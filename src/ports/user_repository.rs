//! User repository port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::user::{Email, User};

/// Users are never hard-deleted, so there is no delete operation.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// # Errors
    ///
    /// - `EmailInUse` if another user has the email
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, user: &User) -> Result<(), DomainError>;

    /// Writes `user` if the stored version still matches and returns it with
    /// the version bumped.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user does not exist
    /// - `ConcurrentModification` if the stored version differs
    async fn update(&self, user: &User) -> Result<User, DomainError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, DomainError>;
}
