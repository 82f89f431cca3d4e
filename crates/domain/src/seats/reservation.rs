use serde::{Deserialize, Serialize};

/// Lifecycle of one reservation against a conference's inventory.
///
/// ```text
/// Open ──► Committed
///   │
///   └────► Cancelled
///
/// Rejected (recorded when the request could not be satisfied)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Seats are held and may still be released.
    Open,
    /// Seats are permanently taken.
    Committed,
    /// Seats were released back to the pool.
    Cancelled,
    /// Not enough seats were available; nothing is held.
    Rejected,
}

impl ReservationStatus {
    /// Returns true if this reservation currently holds seats.
    pub fn holds_seats(&self) -> bool {
        matches!(self, ReservationStatus::Open | ReservationStatus::Committed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Open => "Open",
            ReservationStatus::Committed => "Committed",
            ReservationStatus::Cancelled => "Cancelled",
            ReservationStatus::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reservation as tracked by the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub quantity: u32,
    pub status: ReservationStatus,
}

impl Reservation {
    /// Outcome of the original request that created this reservation.
    pub fn outcome(&self) -> ReservationOutcome {
        match self.status {
            ReservationStatus::Rejected => ReservationOutcome::Rejected,
            _ => ReservationOutcome::Accepted,
        }
    }
}

/// Whether a reservation request was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationOutcome {
    Accepted,
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_open_and_committed_hold_seats() {
        assert!(ReservationStatus::Open.holds_seats());
        assert!(ReservationStatus::Committed.holds_seats());
        assert!(!ReservationStatus::Cancelled.holds_seats());
        assert!(!ReservationStatus::Rejected.holds_seats());
    }

    #[test]
    fn test_cancelled_reservation_was_still_accepted() {
        let reservation = Reservation {
            quantity: 2,
            status: ReservationStatus::Cancelled,
        };
        assert_eq!(reservation.outcome(), ReservationOutcome::Accepted);

        let rejected = Reservation {
            quantity: 2,
            status: ReservationStatus::Rejected,
        };
        assert_eq!(rejected.outcome(), ReservationOutcome::Rejected);
    }
}
