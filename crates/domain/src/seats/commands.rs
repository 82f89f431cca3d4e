//! Seat inventory commands.

use common::{AggregateId, ConferenceId, ReservationId};
use serde::{Deserialize, Serialize};

use crate::command::Command;

use super::SeatsAvailability;

/// Command to open a conference's seat inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSeatsAvailability {
    pub conference_id: ConferenceId,
    pub available_tickets: u32,
}

impl CreateSeatsAvailability {
    pub fn new(conference_id: ConferenceId, available_tickets: u32) -> Self {
        Self {
            conference_id,
            available_tickets,
        }
    }
}

/// Command to hold seats for a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeSeatReservation {
    pub conference_id: ConferenceId,
    pub reservation_id: ReservationId,
    pub number_of_seats: u32,
}

impl MakeSeatReservation {
    pub fn new(
        conference_id: ConferenceId,
        reservation_id: ReservationId,
        number_of_seats: u32,
    ) -> Self {
        Self {
            conference_id,
            reservation_id,
            number_of_seats,
        }
    }
}

/// Command to permanently take a reservation's seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSeatReservation {
    pub conference_id: ConferenceId,
    pub reservation_id: ReservationId,
}

impl CommitSeatReservation {
    pub fn new(conference_id: ConferenceId, reservation_id: ReservationId) -> Self {
        Self {
            conference_id,
            reservation_id,
        }
    }
}

/// Command to release a reservation's seats back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSeatReservation {
    pub conference_id: ConferenceId,
    pub reservation_id: ReservationId,
}

impl CancelSeatReservation {
    pub fn new(conference_id: ConferenceId, reservation_id: ReservationId) -> Self {
        Self {
            conference_id,
            reservation_id,
        }
    }
}

macro_rules! targets_conference {
    ($($command:ty),+ $(,)?) => {
        $(
            impl Command for $command {
                type Aggregate = SeatsAvailability;

                fn aggregate_id(&self) -> AggregateId {
                    self.conference_id.into()
                }
            }
        )+
    };
}

targets_conference!(
    CreateSeatsAvailability,
    MakeSeatReservation,
    CommitSeatReservation,
    CancelSeatReservation,
);
