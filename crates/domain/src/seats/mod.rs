//! Seat inventory for a conference.

mod aggregate;
mod commands;
mod events;
mod reservation;
mod service;

pub use aggregate::SeatsAvailability;
pub use commands::*;
pub use events::{
    ReservationData, ReservationRejectedData, SeatsAvailabilityCreatedData, SeatsEvent,
};
pub use reservation::{Reservation, ReservationOutcome, ReservationStatus};
pub use service::{ReservationResult, SeatsAvailabilityService};

use common::{ConferenceId, ReservationId};
use thiserror::Error;

/// Errors that can occur during seat inventory operations.
#[derive(Debug, Error)]
pub enum SeatsError {
    /// The conference's inventory already exists.
    #[error("Seats availability already created for conference {conference_id}")]
    AlreadyCreated { conference_id: ConferenceId },

    /// Reservations must be for at least one seat.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The reservation is missing or not in a state that allows the action.
    #[error("Cannot {action} reservation {reservation_id} ({})", status_label(.status))]
    InvalidState {
        reservation_id: ReservationId,
        status: Option<ReservationStatus>,
        action: &'static str,
    },
}

fn status_label(status: &Option<ReservationStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("unknown")
}
