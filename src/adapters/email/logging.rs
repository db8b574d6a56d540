//! EmailSender that only logs.
//!
//! # Usage
//!
//! ```ignore
//! let sender: Arc<dyn EmailSender> = Arc::new(LoggingEmailSender::new());
//! ```

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::user::User;
use crate::ports::EmailSender;

#[derive(Debug, Clone, Default)]
pub struct LoggingEmailSender;

impl LoggingEmailSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send_verification_email(&self, user: &User, token: &str) -> Result<(), DomainError> {
        tracing::info!(
            user_id = %user.id,
            email = %user.email,
            token_len = token.len(),
            "Verification email queued"
        );
        Ok(())
    }

    async fn send_welcome_email(&self, user: &User) -> Result<(), DomainError> {
        tracing::info!(user_id = %user.id, email = %user.email, "Welcome email queued");
        Ok(())
    }

    async fn send_badge_email(&self, user: &User, badge: &str) -> Result<(), DomainError> {
        tracing::info!(user_id = %user.id, badge, "Badge email queued");
        Ok(())
    }
}
