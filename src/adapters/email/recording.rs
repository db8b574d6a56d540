//! EmailSender that records messages instead of sending them.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::user::User;
use crate::ports::EmailSender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailKind {
    Verification { token: String },
    Welcome,
    Badge { badge: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub user_id: UserId,
    pub to: String,
    pub kind: EmailKind,
}

#[derive(Default)]
pub struct RecordingEmailSender {
    sent: RwLock<Vec<SentEmail>>,
    failing: bool,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every call fails, for checking that callers only log.
    pub fn failing() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            failing: true,
        }
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, user_id: &UserId) -> Vec<EmailKind> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|e| &e.user_id == user_id)
            .map(|e| e.kind.clone())
            .collect()
    }

    async fn record(&self, user: &User, kind: EmailKind) -> Result<(), DomainError> {
        if self.failing {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                "Mail transport unavailable",
            ));
        }
        self.sent.write().await.push(SentEmail {
            user_id: user.id,
            to: user.email.as_str().to_string(),
            kind,
        });
        Ok(())
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_verification_email(&self, user: &User, token: &str) -> Result<(), DomainError> {
        self.record(
            user,
            EmailKind::Verification {
                token: token.to_string(),
            },
        )
        .await
    }

    async fn send_welcome_email(&self, user: &User) -> Result<(), DomainError> {
        self.record(user, EmailKind::Welcome).await
    }

    async fn send_badge_email(&self, user: &User, badge: &str) -> Result<(), DomainError> {
        self.record(
            user,
            EmailKind::Badge {
                badge: badge.to_string(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::user::{Email, NewUser};

    fn user() -> User {
        User::register(
            NewUser {
                name: "Ada".to_string(),
                email: Email::parse("ada@example.com").unwrap(),
                password_hash: "hash".to_string(),
                is_verified: false,
                registration_promo_code: None,
            },
            Timestamp::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn records_each_kind() {
        let sender = RecordingEmailSender::new();
        let user = user();

        sender.send_verification_email(&user, "tok").await.unwrap();
        sender.send_welcome_email(&user).await.unwrap();

        let kinds = sender.sent_to(&user.id).await;
        assert_eq!(
            kinds,
            vec![
                EmailKind::Verification {
                    token: "tok".to_string()
                },
                EmailKind::Welcome
            ]
        );
    }

    #[tokio::test]
    async fn failing_sender_records_nothing() {
        let sender = RecordingEmailSender::failing();

        assert!(sender.send_welcome_email(&user()).await.is_err());
        assert!(sender.sent().await.is_empty());
    }
}
