//! PendingRegistration aggregate.
//!
//! An unverified, unpaid signup intent held while the user is at checkout.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    PendingRegistrationId, StateMachine, Timestamp, ValidationError,
};
use crate::domain::promo::PromoCodeName;
use crate::domain::subscription::Plan;
use crate::domain::user::Email;

/// Expiry windows for pending registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationWindows {
    /// Absolute lifetime of a pending record.
    pub pending_ttl_hours: i64,
    /// How long a started checkout is trusted before the provider is asked.
    pub checkout_stale_minutes: i64,
}

impl Default for RegistrationWindows {
    fn default() -> Self {
        Self {
            pending_ttl_hours: 24,
            checkout_stale_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    Created,
    CheckoutStarted,
    Completed,
    Expired,
}

impl StateMachine for RegistrationState {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use RegistrationState::*;
        match self {
            Created => vec![CheckoutStarted, Expired],
            // A new session may replace an abandoned one.
            CheckoutStarted => vec![CheckoutStarted, Completed, Expired],
            Completed | Expired => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPendingRegistration {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub promo_code: Option<PromoCodeName>,
    pub plan: Plan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub id: PendingRegistrationId,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub promo_code: Option<PromoCodeName>,
    pub plan: Plan,
    pub checkout_session_id: Option<String>,
    pub checkout_started_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl PendingRegistration {
    pub fn create(
        new: NewPendingRegistration,
        windows: &RegistrationWindows,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        if new.name.trim().is_empty() {
            return Err(ValidationError::empty_field("name"));
        }
        if new.password_hash.is_empty() {
            return Err(ValidationError::empty_field("password_hash"));
        }
        if !new.plan.is_purchasable() {
            return Err(ValidationError::invalid_format(
                "plan",
                format!("{} cannot be purchased", new.plan),
            ));
        }

        Ok(Self {
            id: PendingRegistrationId::new(),
            name: new.name.trim().to_string(),
            email: new.email,
            password_hash: new.password_hash,
            promo_code: new.promo_code,
            plan: new.plan,
            checkout_session_id: None,
            checkout_started_at: None,
            created_at: now,
            expires_at: now.add_hours(windows.pending_ttl_hours),
        })
    }

    /// Expired records no longer block the email.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        !now.is_before(&self.expires_at)
    }

    /// State derived from the stored fields. `Completed` is never stored:
    /// the record is deleted once the user exists.
    pub fn state(&self, now: Timestamp) -> RegistrationState {
        if self.is_expired(now) {
            RegistrationState::Expired
        } else if self.checkout_session_id.is_some() {
            RegistrationState::CheckoutStarted
        } else {
            RegistrationState::Created
        }
    }

    /// True once a started checkout has gone quiet for longer than the
    /// stale window.
    pub fn is_checkout_stale(&self, windows: &RegistrationWindows, now: Timestamp) -> bool {
        self.checkout_started_at
            .is_some_and(|started| !now.is_before(&started.add_minutes(windows.checkout_stale_minutes)))
    }

    pub fn start_checkout(
        &mut self,
        session_id: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), ValidationError> {
        self.state(now).transition_to(RegistrationState::CheckoutStarted)?;
        self.checkout_session_id = Some(session_id.into());
        self.checkout_started_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(now: Timestamp) -> PendingRegistration {
        PendingRegistration::create(
            NewPendingRegistration {
                name: "Grace".to_string(),
                email: Email::parse("grace@example.com").unwrap(),
                password_hash: "hash".to_string(),
                promo_code: None,
                plan: Plan::Monthly,
            },
            &RegistrationWindows::default(),
            now,
        )
        .unwrap()
    }

    #[test]
    fn expires_after_twenty_four_hours() {
        let now = Timestamp::now();
        let reg = pending(now);
        assert_eq!(reg.expires_at, now.add_hours(24));
        assert!(!reg.is_expired(now.add_hours(23)));
        assert!(reg.is_expired(now.add_hours(24)));
        assert_eq!(reg.state(now.add_hours(25)), RegistrationState::Expired);
    }

    #[test]
    fn admin_plan_cannot_be_pending() {
        let result = PendingRegistration::create(
            NewPendingRegistration {
                name: "Grace".to_string(),
                email: Email::parse("grace@example.com").unwrap(),
                password_hash: "hash".to_string(),
                promo_code: None,
                plan: Plan::Admin,
            },
            &RegistrationWindows::default(),
            Timestamp::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn start_checkout_records_session() {
        let now = Timestamp::now();
        let mut reg = pending(now);
        reg.start_checkout("cs_test_1", now).unwrap();
        assert_eq!(reg.state(now), RegistrationState::CheckoutStarted);
        assert_eq!(reg.checkout_session_id.as_deref(), Some("cs_test_1"));
    }

    #[test]
    fn checkout_can_be_restarted_but_not_after_expiry() {
        let now = Timestamp::now();
        let mut reg = pending(now);
        reg.start_checkout("cs_1", now).unwrap();
        reg.start_checkout("cs_2", now.add_minutes(10)).unwrap();
        assert_eq!(reg.checkout_session_id.as_deref(), Some("cs_2"));

        assert!(reg.start_checkout("cs_3", now.add_hours(25)).is_err());
    }

    #[test]
    fn checkout_goes_stale_after_five_minutes() {
        let windows = RegistrationWindows::default();
        let now = Timestamp::now();
        let mut reg = pending(now);
        assert!(!reg.is_checkout_stale(&windows, now.add_hours(1)));

        reg.start_checkout("cs_1", now).unwrap();
        assert!(!reg.is_checkout_stale(&windows, now.add_minutes(4)));
        assert!(reg.is_checkout_stale(&windows, now.add_minutes(5)));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(RegistrationState::Completed.is_terminal());
        assert!(RegistrationState::Expired.is_terminal());
        assert!(!RegistrationState::Created.can_transition_to(&RegistrationState::Completed));
    }
}
