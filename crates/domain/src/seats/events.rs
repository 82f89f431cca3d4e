//! Seat inventory events.

use chrono::{DateTime, Utc};
use common::{ConferenceId, ReservationId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a conference's seat inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SeatsEvent {
    /// The inventory was opened with its initial capacity.
    SeatsAvailabilityCreated(SeatsAvailabilityCreatedData),

    /// Seats were held for a reservation.
    ReservationAccepted(ReservationData),

    /// A reservation asked for more seats than were available.
    ReservationRejected(ReservationRejectedData),

    /// Held seats were permanently taken.
    ReservationCommitted(ReservationData),

    /// Held seats were released.
    ReservationCancelled(ReservationData),
}

impl DomainEvent for SeatsEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SeatsEvent::SeatsAvailabilityCreated(_) => "SeatsAvailabilityCreated",
            SeatsEvent::ReservationAccepted(_) => "ReservationAccepted",
            SeatsEvent::ReservationRejected(_) => "ReservationRejected",
            SeatsEvent::ReservationCommitted(_) => "ReservationCommitted",
            SeatsEvent::ReservationCancelled(_) => "ReservationCancelled",
        }
    }

    fn correlation_id(&self) -> Option<String> {
        self.reservation_id().map(|id| id.to_string())
    }
}

impl SeatsEvent {
    pub fn conference_id(&self) -> ConferenceId {
        match self {
            SeatsEvent::SeatsAvailabilityCreated(data) => data.conference_id,
            SeatsEvent::ReservationRejected(data) => data.conference_id,
            SeatsEvent::ReservationAccepted(data)
            | SeatsEvent::ReservationCommitted(data)
            | SeatsEvent::ReservationCancelled(data) => data.conference_id,
        }
    }

    /// Returns the reservation this event concerns, if any.
    pub fn reservation_id(&self) -> Option<ReservationId> {
        match self {
            SeatsEvent::SeatsAvailabilityCreated(_) => None,
            SeatsEvent::ReservationRejected(data) => Some(data.reservation_id),
            SeatsEvent::ReservationAccepted(data)
            | SeatsEvent::ReservationCommitted(data)
            | SeatsEvent::ReservationCancelled(data) => Some(data.reservation_id),
        }
    }
}

/// Data for SeatsAvailabilityCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatsAvailabilityCreatedData {
    pub conference_id: ConferenceId,
    pub available_tickets: u32,
    pub created_at: DateTime<Utc>,
}

/// Data shared by the accepted, committed and cancelled reservation events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationData {
    pub conference_id: ConferenceId,
    pub reservation_id: ReservationId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Data for ReservationRejected event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRejectedData {
    pub conference_id: ConferenceId,
    pub reservation_id: ReservationId,
    pub quantity: u32,

    /// Seats that were free when the request was refused.
    pub available_tickets: u32,

    pub occurred_at: DateTime<Utc>,
}

// Convenience constructors
impl SeatsEvent {
    pub fn created(conference_id: ConferenceId, available_tickets: u32) -> Self {
        SeatsEvent::SeatsAvailabilityCreated(SeatsAvailabilityCreatedData {
            conference_id,
            available_tickets,
            created_at: Utc::now(),
        })
    }

    pub fn reservation_accepted(
        conference_id: ConferenceId,
        reservation_id: ReservationId,
        quantity: u32,
    ) -> Self {
        SeatsEvent::ReservationAccepted(ReservationData::now(
            conference_id,
            reservation_id,
            quantity,
        ))
    }

    pub fn reservation_rejected(
        conference_id: ConferenceId,
        reservation_id: ReservationId,
        quantity: u32,
        available_tickets: u32,
    ) -> Self {
        SeatsEvent::ReservationRejected(ReservationRejectedData {
            conference_id,
            reservation_id,
            quantity,
            available_tickets,
            occurred_at: Utc::now(),
        })
    }

    pub fn reservation_committed(
        conference_id: ConferenceId,
        reservation_id: ReservationId,
        quantity: u32,
    ) -> Self {
        SeatsEvent::ReservationCommitted(ReservationData::now(
            conference_id,
            reservation_id,
            quantity,
        ))
    }

    pub fn reservation_cancelled(
        conference_id: ConferenceId,
        reservation_id: ReservationId,
        quantity: u32,
    ) -> Self {
        SeatsEvent::ReservationCancelled(ReservationData::now(
            conference_id,
            reservation_id,
            quantity,
        ))
    }
}

impl ReservationData {
    fn now(conference_id: ConferenceId, reservation_id: ReservationId, quantity: u32) -> Self {
        Self {
            conference_id,
            reservation_id,
            quantity,
            occurred_at: Utc::now(),
        }
    }
}
