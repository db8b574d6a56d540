//! State machine trait for status enums.
//!
//! Used by the lifecycle enums whose transitions are restricted: pending
//! registrations and payment ledger entries. Subscription status is not a
//! `StateMachine` because the provider may move it between any two states.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors define the allowed edges and get a validated
/// `transition_to` for free.
///
/// ```ignore
/// let next = PaymentStatus::Succeeded.transition_to(PaymentStatus::Refunded)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs the transition, or reports the rejected edge.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// True when no outgoing transitions exist.
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Green,
        Amber,
        Red,
        Off,
    }

    impl StateMachine for Light {
        fn can_transition_to(&self, target: &Self) -> bool {
            self.valid_transitions().contains(target)
        }

        fn valid_transitions(&self) -> Vec<Self> {
            match self {
                Light::Green => vec![Light::Amber, Light::Off],
                Light::Amber => vec![Light::Red, Light::Off],
                Light::Red => vec![Light::Green, Light::Off],
                Light::Off => vec![],
            }
        }
    }

    #[test]
    fn allowed_edge_returns_target() {
        assert_eq!(Light::Green.transition_to(Light::Amber), Ok(Light::Amber));
    }

    #[test]
    fn rejected_edge_names_both_states() {
        let err = Light::Green.transition_to(Light::Red).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Green"));
        assert!(msg.contains("Red"));
    }

    #[test]
    fn terminal_state_has_no_edges() {
        assert!(Light::Off.is_terminal());
        assert!(!Light::Red.is_terminal());
    }
}
