//! Commands the process manager asks the application to run.

use common::{ConferenceId, OrderId, ReservationId};
use domain::{
    CancelSeatReservation, CommitSeatReservation, MakeSeatReservation, MarkAsBooked, RejectOrder,
};

/// A follow-up command issued by the process manager.
///
/// The manager never touches an aggregate itself; the application dispatches
/// these to the owning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaCommand {
    MakeSeatReservation(MakeSeatReservation),
    MarkAsBooked(MarkAsBooked),
    RejectOrder(RejectOrder),
    CommitSeatReservation(CommitSeatReservation),
    CancelSeatReservation(CancelSeatReservation),
}

impl SagaCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SagaCommand::MakeSeatReservation(_) => "MakeSeatReservation",
            SagaCommand::MarkAsBooked(_) => "MarkAsBooked",
            SagaCommand::RejectOrder(_) => "RejectOrder",
            SagaCommand::CommitSeatReservation(_) => "CommitSeatReservation",
            SagaCommand::CancelSeatReservation(_) => "CancelSeatReservation",
        }
    }

    pub(crate) fn reserve(
        conference_id: ConferenceId,
        order_id: OrderId,
        number_of_seats: u32,
    ) -> Self {
        SagaCommand::MakeSeatReservation(MakeSeatReservation::new(
            conference_id,
            ReservationId::from(order_id),
            number_of_seats,
        ))
    }

    pub(crate) fn commit(conference_id: ConferenceId, order_id: OrderId) -> Self {
        SagaCommand::CommitSeatReservation(CommitSeatReservation::new(
            conference_id,
            ReservationId::from(order_id),
        ))
    }

    pub(crate) fn cancel(conference_id: ConferenceId, order_id: OrderId) -> Self {
        SagaCommand::CancelSeatReservation(CancelSeatReservation::new(
            conference_id,
            ReservationId::from(order_id),
        ))
    }
}
