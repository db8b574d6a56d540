//! Outbound email port.
//!
//! Callers treat every send as fire-and-forget: a failure is logged and
//! never fails the operation that triggered it.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::user::User;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_verification_email(&self, user: &User, token: &str) -> Result<(), DomainError>;

    async fn send_welcome_email(&self, user: &User) -> Result<(), DomainError>;

    async fn send_badge_email(&self, user: &User, badge: &str) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_is_object_safe() {
        fn _accepts_dyn(_sender: &dyn EmailSender) {}
    }
}
