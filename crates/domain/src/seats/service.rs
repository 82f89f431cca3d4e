//! SeatsAvailability service.

use common::{AggregateId, ConferenceId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult, RetryPolicy};
use crate::error::DomainError;

use super::{
    CancelSeatReservation, CommitSeatReservation, CreateSeatsAvailability, MakeSeatReservation,
    ReservationOutcome, SeatsAvailability, SeatsError, SeatsEvent,
};

/// What came of a reservation request.
#[derive(Debug, Clone)]
pub struct ReservationResult {
    pub outcome: ReservationOutcome,

    /// Events recorded by this call. Empty when the reservation id had
    /// already been handled and `outcome` is the earlier one.
    pub events: Vec<SeatsEvent>,

    pub available_tickets: u32,
}

/// Service for managing conference seat inventories.
pub struct SeatsAvailabilityService<S: EventStore> {
    handler: CommandHandler<S, SeatsAvailability>,
}

impl<S: EventStore> SeatsAvailabilityService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.handler = self.handler.with_retry_policy(retry);
        self
    }

    pub fn handler(&self) -> &CommandHandler<S, SeatsAvailability> {
        &self.handler
    }

    /// Opens a conference's inventory unless it already exists.
    ///
    /// Returns the recorded events. They are empty when the inventory was
    /// already there; the existing one is left untouched.
    #[tracing::instrument(skip(self))]
    pub async fn create_if_absent(
        &self,
        cmd: CreateSeatsAvailability,
    ) -> Result<Vec<SeatsEvent>, DomainError> {
        let CreateSeatsAvailability {
            conference_id,
            available_tickets,
        } = cmd;

        let created = self
            .handler
            .create(cmd.aggregate_id(), |seats| {
                seats.create(conference_id, available_tickets)
            })
            .await;

        match created {
            Ok(result) => {
                tracing::info!(%conference_id, available_tickets, "seats availability created");
                Ok(result.events)
            }
            Err(DomainError::AlreadyExists { .. }) => {
                tracing::debug!(%conference_id, "seats availability already exists");
                Ok(vec![])
            }
            Err(e) => Err(e),
        }
    }

    /// Tries to hold seats for a reservation.
    #[tracing::instrument(skip(self))]
    pub async fn make_reservation(
        &self,
        cmd: MakeSeatReservation,
    ) -> Result<ReservationResult, DomainError> {
        let MakeSeatReservation {
            reservation_id,
            number_of_seats,
            ..
        } = cmd;

        let result = self
            .handler
            .execute_with_snapshot(cmd.aggregate_id(), |seats| {
                seats.make_reservation(reservation_id, number_of_seats)
            })
            .await?;

        let outcome = result.aggregate.outcome_of(reservation_id).ok_or(
            SeatsError::InvalidState {
                reservation_id,
                status: None,
                action: "make",
            },
        )?;

        if !result.is_noop() {
            match outcome {
                ReservationOutcome::Accepted => {
                    metrics::counter!("reservations_accepted_total").increment(1)
                }
                ReservationOutcome::Rejected => {
                    metrics::counter!("reservations_rejected_total").increment(1)
                }
            }
        }

        Ok(ReservationResult {
            outcome,
            events: result.events,
            available_tickets: result.aggregate.available_tickets(),
        })
    }

    /// Permanently takes a reservation's seats.
    #[tracing::instrument(skip(self))]
    pub async fn commit_reservation(
        &self,
        cmd: CommitSeatReservation,
    ) -> Result<CommandResult<SeatsAvailability>, DomainError> {
        let reservation_id = cmd.reservation_id;
        self.handler
            .execute_with_snapshot(cmd.aggregate_id(), |seats| {
                seats.commit_reservation(reservation_id)
            })
            .await
    }

    /// Releases a reservation's seats.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_reservation(
        &self,
        cmd: CancelSeatReservation,
    ) -> Result<CommandResult<SeatsAvailability>, DomainError> {
        let reservation_id = cmd.reservation_id;
        self.handler
            .execute_with_snapshot(cmd.aggregate_id(), |seats| {
                seats.cancel_reservation(reservation_id)
            })
            .await
    }

    /// Gets a conference's inventory.
    pub async fn get_availability(
        &self,
        conference_id: ConferenceId,
    ) -> Result<Option<SeatsAvailability>, DomainError> {
        self.handler
            .load_existing(AggregateId::from(conference_id))
            .await
    }
}
