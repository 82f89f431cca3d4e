//! SeatsAvailability aggregate implementation.

use std::collections::HashMap;

use common::{AggregateId, ConferenceId, ReservationId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};

use super::{
    Reservation, ReservationOutcome, ReservationStatus, SeatsError, SeatsEvent,
    events::{ReservationData, ReservationRejectedData},
};

/// Seat inventory of one conference.
///
/// Every seat is either available or held by an open or committed
/// reservation, so `available_tickets + held_tickets == capacity` at every
/// version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatsAvailability {
    id: Option<ConferenceId>,

    #[serde(default)]
    version: Version,

    capacity: u32,

    available_tickets: u32,

    reservations: HashMap<ReservationId, Reservation>,
}

impl Aggregate for SeatsAvailability {
    type Event = SeatsEvent;
    type Error = SeatsError;

    fn aggregate_type() -> &'static str {
        "SeatsAvailability"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(Into::into)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SeatsEvent::SeatsAvailabilityCreated(data) => {
                self.id = Some(data.conference_id);
                self.capacity = data.available_tickets;
                self.available_tickets = data.available_tickets;
            }
            SeatsEvent::ReservationAccepted(data) => self.apply_reservation_accepted(data),
            SeatsEvent::ReservationRejected(data) => self.apply_reservation_rejected(data),
            SeatsEvent::ReservationCommitted(data) => {
                self.set_status(data.reservation_id, ReservationStatus::Committed);
            }
            SeatsEvent::ReservationCancelled(data) => {
                self.available_tickets = self.available_tickets.saturating_add(data.quantity);
                self.set_status(data.reservation_id, ReservationStatus::Cancelled);
            }
        }
    }
}

impl SnapshotCapable for SeatsAvailability {
    fn snapshot_interval() -> usize {
        50 // Snapshot every 50 events
    }
}

// Query methods
impl SeatsAvailability {
    pub fn conference_id(&self) -> Option<ConferenceId> {
        self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn available_tickets(&self) -> u32 {
        self.available_tickets
    }

    /// Seats held by open or committed reservations.
    pub fn held_tickets(&self) -> u32 {
        self.reservations
            .values()
            .filter(|r| r.status.holds_seats())
            .map(|r| r.quantity)
            .sum()
    }

    pub fn reservation(&self, reservation_id: ReservationId) -> Option<&Reservation> {
        self.reservations.get(&reservation_id)
    }

    /// Outcome of a previously made reservation request.
    pub fn outcome_of(&self, reservation_id: ReservationId) -> Option<ReservationOutcome> {
        self.reservation(reservation_id).map(Reservation::outcome)
    }
}

// Command methods (return events)
impl SeatsAvailability {
    /// Opens the inventory with `available_tickets` seats.
    pub fn create(
        &self,
        conference_id: ConferenceId,
        available_tickets: u32,
    ) -> Result<Vec<SeatsEvent>, SeatsError> {
        if let Some(existing) = self.id {
            return Err(SeatsError::AlreadyCreated {
                conference_id: existing,
            });
        }

        Ok(vec![SeatsEvent::created(conference_id, available_tickets)])
    }

    /// Holds `quantity` seats for a reservation, or records a rejection when
    /// not enough are free.
    ///
    /// A reservation id that was already handled records nothing; its first
    /// outcome stands.
    pub fn make_reservation(
        &self,
        reservation_id: ReservationId,
        quantity: u32,
    ) -> Result<Vec<SeatsEvent>, SeatsError> {
        let conference_id = self.require_created(reservation_id, "make")?;

        if quantity == 0 {
            return Err(SeatsError::InvalidQuantity { quantity });
        }

        if self.reservations.contains_key(&reservation_id) {
            return Ok(vec![]);
        }

        if quantity <= self.available_tickets {
            Ok(vec![SeatsEvent::reservation_accepted(
                conference_id,
                reservation_id,
                quantity,
            )])
        } else {
            Ok(vec![SeatsEvent::reservation_rejected(
                conference_id,
                reservation_id,
                quantity,
                self.available_tickets,
            )])
        }
    }

    /// Permanently takes an open reservation's seats.
    pub fn commit_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<SeatsEvent>, SeatsError> {
        let conference_id = self.require_created(reservation_id, "commit")?;

        match self.reservations.get(&reservation_id) {
            Some(r) if r.status == ReservationStatus::Committed => Ok(vec![]),
            Some(r) if r.status == ReservationStatus::Open => Ok(vec![
                SeatsEvent::reservation_committed(conference_id, reservation_id, r.quantity),
            ]),
            other => Err(SeatsError::InvalidState {
                reservation_id,
                status: other.map(|r| r.status),
                action: "commit",
            }),
        }
    }

    /// Releases an open reservation's seats back to the pool.
    pub fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<SeatsEvent>, SeatsError> {
        let conference_id = self.require_created(reservation_id, "cancel")?;

        match self.reservations.get(&reservation_id) {
            Some(r) if r.status == ReservationStatus::Cancelled => Ok(vec![]),
            Some(r) if r.status == ReservationStatus::Open => Ok(vec![
                SeatsEvent::reservation_cancelled(conference_id, reservation_id, r.quantity),
            ]),
            other => Err(SeatsError::InvalidState {
                reservation_id,
                status: other.map(|r| r.status),
                action: "cancel",
            }),
        }
    }

    fn require_created(
        &self,
        reservation_id: ReservationId,
        action: &'static str,
    ) -> Result<ConferenceId, SeatsError> {
        self.id.ok_or(SeatsError::InvalidState {
            reservation_id,
            status: None,
            action,
        })
    }
}

// Event application helpers
impl SeatsAvailability {
    fn apply_reservation_accepted(&mut self, data: ReservationData) {
        self.available_tickets = self.available_tickets.saturating_sub(data.quantity);
        self.reservations.insert(
            data.reservation_id,
            Reservation {
                quantity: data.quantity,
                status: ReservationStatus::Open,
            },
        );
    }

    fn apply_reservation_rejected(&mut self, data: ReservationRejectedData) {
        self.reservations.insert(
            data.reservation_id,
            Reservation {
                quantity: data.quantity,
                status: ReservationStatus::Rejected,
            },
        );
    }

    fn set_status(&mut self, reservation_id: ReservationId, status: ReservationStatus) {
        if let Some(reservation) = self.reservations.get_mut(&reservation_id) {
            reservation.status = status;
        }
    }
}
