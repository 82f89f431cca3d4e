//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// New ──► Booked
///  │        │
///  └────────┴──► Rejected
/// ```
///
/// Expiry is recorded as a fact on the order without moving it out of its
/// current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Order was placed and awaits a seat reservation outcome.
    #[default]
    New,

    /// Seats were reserved for the order.
    Booked,

    /// The order cannot be fulfilled (terminal state).
    Rejected,
}

impl OrderState {
    /// Returns true if the order can be marked as booked in this state.
    pub fn can_mark_as_booked(&self) -> bool {
        matches!(self, OrderState::New)
    }

    /// Returns true if the order can be rejected in this state.
    pub fn can_reject(&self) -> bool {
        matches!(self, OrderState::New | OrderState::Booked)
    }

    /// Returns true if the order can be expired in this state.
    pub fn can_expire(&self) -> bool {
        matches!(self, OrderState::New | OrderState::Booked)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Rejected)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::New => "New",
            OrderState::Booked => "Booked",
            OrderState::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_new() {
        assert_eq!(OrderState::default(), OrderState::New);
    }

    #[test]
    fn test_only_new_can_be_booked() {
        assert!(OrderState::New.can_mark_as_booked());
        assert!(!OrderState::Booked.can_mark_as_booked());
        assert!(!OrderState::Rejected.can_mark_as_booked());
    }

    #[test]
    fn test_reject_and_expire_from_live_states() {
        for state in [OrderState::New, OrderState::Booked] {
            assert!(state.can_reject());
            assert!(state.can_expire());
        }
        assert!(!OrderState::Rejected.can_reject());
        assert!(!OrderState::Rejected.can_expire());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderState::New.is_terminal());
        assert!(!OrderState::Booked.is_terminal());
        assert!(OrderState::Rejected.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderState::New.to_string(), "New");
        assert_eq!(OrderState::Booked.to_string(), "Booked");
        assert_eq!(OrderState::Rejected.to_string(), "Rejected");
    }
}
