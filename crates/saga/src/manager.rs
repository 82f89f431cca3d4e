//! Order process manager.
//!
//! Reacts to order, seat and payment events, moves the correlated
//! [`OrderProcessState`] along and answers with the commands the application
//! should run next.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{ConferenceId, OrderId, ReservationId};
use domain::order::OrderPlacedData;
use domain::{CommandHandler, DomainError, ExpireOrder, MarkAsBooked, RejectOrder, RetryPolicy};
use event_store::EventStore;

use crate::aggregate::OrderProcessState;
use crate::commands::SagaCommand;
use crate::error::{Result, SagaError};
use crate::inbound::PaymentReceived;
use crate::scheduler::{CommandScheduler, ScheduledCommand};
use crate::state::{Inbound, ProcessState, Transition};

/// Coordinates an order with its seat reservation.
///
/// Every handler is idempotent. A redelivered event records nothing but
/// answers with the same follow-up commands again, because the first
/// delivery may have failed before they ran; the receiving aggregates treat
/// the repeats as no-ops. Events for processes that finished along another
/// edge, and events that arrive before their predecessor, produce nothing.
pub struct OrderProcessManager<S: EventStore, C: CommandScheduler> {
    handler: CommandHandler<S, OrderProcessState, SagaError>,
    scheduler: C,
    payment_window: Duration,
}

impl<S: EventStore, C: CommandScheduler> OrderProcessManager<S, C> {
    /// Creates a manager that gives each order `payment_window` to be paid.
    pub fn new(store: S, scheduler: C, payment_window: Duration) -> Self {
        Self {
            handler: CommandHandler::new(store),
            scheduler,
            payment_window,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.handler = self.handler.with_retry_policy(retry);
        self
    }

    pub fn scheduler(&self) -> &C {
        &self.scheduler
    }

    pub fn payment_window(&self) -> Duration {
        self.payment_window
    }

    /// Starts the process for a placed order and requests its seats.
    ///
    /// Also schedules the payment timeout. A process that already exists
    /// means the event was redelivered: while the process is still running
    /// the seat request is resent, and a missing timeout is scheduled.
    #[tracing::instrument(skip(self, placed), fields(order_id = %placed.order_id))]
    pub async fn on_order_placed(&self, placed: &OrderPlacedData) -> Result<Vec<SagaCommand>> {
        let order_id = placed.order_id;
        let stream = OrderProcessState::stream_id(order_id);
        let reserve = SagaCommand::reserve(
            placed.conference_id,
            order_id,
            placed.number_of_tickets,
        );

        let created = self
            .handler
            .create(stream, |process| {
                process.start(order_id, placed.conference_id, placed.number_of_tickets)
            })
            .await;

        match created {
            Ok(_) => {
                metrics::counter!("saga_processes_started_total").increment(1);
                tracing::info!(
                    conference_id = %placed.conference_id,
                    number_of_tickets = placed.number_of_tickets,
                    "order process started"
                );
                self.schedule_expiry(order_id).await;
                Ok(vec![reserve])
            }
            Err(SagaError::Domain(DomainError::AlreadyExists { .. })) => {
                let Some(process) = self.get_process(order_id).await? else {
                    return Ok(vec![]);
                };
                match process.state() {
                    Some(state) if !state.is_terminal() => {
                        if process.expiry_token().is_none() {
                            self.schedule_expiry(order_id).await;
                        }
                        metrics::counter!("saga_redeliveries_total", "event" => "OrderPlaced")
                            .increment(1);
                        tracing::info!(%state, "OrderPlaced redelivered, resending seat request");
                        Ok(vec![reserve])
                    }
                    _ => {
                        tracing::debug!("OrderPlaced redelivered after the process finished");
                        Ok(vec![])
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Seats were reserved: the order can be booked.
    #[tracing::instrument(skip(self))]
    pub async fn on_reservation_accepted(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<SagaCommand>> {
        let order_id = OrderId::from(reservation_id);
        let commands = match self.advance(order_id, Transition::AcceptReservation).await? {
            Some(_) => vec![SagaCommand::MarkAsBooked(MarkAsBooked::new(order_id))],
            None => vec![],
        };
        Ok(commands)
    }

    /// Seats could not be reserved: the order is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn on_reservation_rejected(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<SagaCommand>> {
        let order_id = OrderId::from(reservation_id);
        let commands = match self.advance(order_id, Transition::RejectReservation).await? {
            Some(process) => {
                self.cancel_expiry(&process);
                vec![SagaCommand::RejectOrder(RejectOrder::new(order_id))]
            }
            None => vec![],
        };
        Ok(commands)
    }

    /// The order was paid: its seats are committed for good.
    #[tracing::instrument(skip(self, payment), fields(order_id = %payment.order_id))]
    pub async fn on_payment_received(
        &self,
        payment: &PaymentReceived,
    ) -> Result<Vec<SagaCommand>> {
        let order_id = payment.order_id;
        let commands = match self.advance(order_id, Transition::ReceivePayment).await? {
            Some(process) => {
                self.cancel_expiry(&process);
                Self::conference_command(&process, SagaCommand::commit)?
                    .into_iter()
                    .collect()
            }
            None => vec![],
        };
        Ok(commands)
    }

    /// The payment window elapsed: release the seats and reject the order.
    #[tracing::instrument(skip(self))]
    pub async fn on_order_expired(&self, order_id: OrderId) -> Result<Vec<SagaCommand>> {
        let commands = match self.advance(order_id, Transition::Expire).await? {
            Some(process) => {
                self.cancel_expiry(&process);
                let mut commands: Vec<SagaCommand> =
                    Self::conference_command(&process, SagaCommand::cancel)?
                        .into_iter()
                        .collect();
                commands.push(SagaCommand::RejectOrder(RejectOrder::new(order_id)));
                commands
            }
            None => vec![],
        };
        Ok(commands)
    }

    /// Decides whether an `ExpireOrder` may reach the order.
    ///
    /// Orders whose process waits for payment can expire. An already expired
    /// process admits the command again so a redelivered timeout can finish
    /// the compensation. Anything else is a stray or late timeout and is
    /// dropped.
    #[tracing::instrument(skip(self))]
    pub async fn admit_expiry(&self, order_id: OrderId) -> Result<bool> {
        let state = self.get_process(order_id).await?.and_then(|p| p.state());
        let admitted = matches!(
            state,
            Some(ProcessState::AwaitingPayment | ProcessState::Expired)
        );
        if !admitted {
            metrics::counter!("saga_expiries_dropped_total").increment(1);
            tracing::debug!(
                state = state.map(|s| s.as_str()).unwrap_or("none"),
                "expiry dropped"
            );
        }
        Ok(admitted)
    }

    /// Loads the process correlated with `order_id`.
    pub async fn get_process(&self, order_id: OrderId) -> Result<Option<OrderProcessState>> {
        self.handler
            .load_existing(OrderProcessState::stream_id(order_id))
            .await
    }

    /// Runs `transition` against the process for `order_id`.
    ///
    /// Returns the process when its follow-up commands are due: the
    /// transition was recorded now, or it had been recorded by an earlier
    /// delivery of the same event. None when the event is ignored.
    async fn advance(
        &self,
        order_id: OrderId,
        transition: Transition,
    ) -> Result<Option<OrderProcessState>> {
        let result = self
            .handler
            .execute(OrderProcessState::stream_id(order_id), |process| {
                process.advance(transition)
            })
            .await;

        let result = match result {
            Ok(result) => result,
            Err(SagaError::Domain(DomainError::AggregateNotFound { .. })) => {
                metrics::counter!("saga_events_ignored_total", "reason" => "unknown_process")
                    .increment(1);
                tracing::warn!(transition = transition.as_str(), "no process for order, event ignored");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(transition = transition.as_str(), error = %e, "transition refused");
                return Err(e);
            }
        };

        if !result.is_noop() {
            let to = transition.to();
            metrics::counter!("saga_transitions_total", "to" => to.as_str()).increment(1);
            tracing::info!(from = %transition.from(), %to, "order process advanced");
            return Ok(Some(result.aggregate));
        }

        match result.aggregate.classify(transition) {
            Inbound::Redelivered => {
                metrics::counter!("saga_redeliveries_total", "event" => transition.as_str())
                    .increment(1);
                tracing::info!(
                    transition = transition.as_str(),
                    "event redelivered, resending follow-up commands"
                );
                return Ok(Some(result.aggregate));
            }
            Inbound::Premature => {
                metrics::counter!("saga_events_ignored_total", "reason" => "out_of_order")
                    .increment(1);
                tracing::warn!(
                    transition = transition.as_str(),
                    state = result.aggregate.state().map(|s| s.as_str()).unwrap_or("none"),
                    "event arrived before its predecessor, ignored"
                );
            }
            _ => {
                tracing::debug!(
                    transition = transition.as_str(),
                    "process already finished, event ignored"
                );
            }
        }
        Ok(None)
    }

    async fn schedule_expiry(&self, order_id: OrderId) {
        let command = ScheduledCommand::ExpireOrder(ExpireOrder::new(order_id));
        let token = match self.scheduler.schedule(command, self.payment_window) {
            Ok(token) => token,
            Err(e) => {
                metrics::counter!("saga_schedule_failures_total").increment(1);
                tracing::warn!(error = %e, "could not schedule payment timeout");
                return;
            }
        };

        let now = Utc::now();
        let fire_at = chrono::Duration::from_std(self.payment_window)
            .ok()
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let recorded = self
            .handler
            .execute(OrderProcessState::stream_id(order_id), |process| {
                process.record_expiry(token, fire_at)
            })
            .await;

        // The timeout still fires and is gated by `admit_expiry`; it just
        // cannot be cancelled early.
        if let Err(e) = recorded {
            tracing::warn!(%token, error = %e, "could not record payment timeout");
        }
    }

    fn cancel_expiry(&self, process: &OrderProcessState) {
        if let Some(token) = process.expiry_token() {
            self.scheduler.cancel(token);
        }
    }

    fn conference_command(
        process: &OrderProcessState,
        build: fn(ConferenceId, OrderId) -> SagaCommand,
    ) -> Result<Option<SagaCommand>> {
        match (process.conference_id(), process.order_id()) {
            (Some(conference_id), Some(order_id)) => Ok(Some(build(conference_id, order_id))),
            _ => Err(SagaError::InvalidOperation {
                from: process.state(),
                action: "address the seat reservation",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::InMemoryCommandScheduler;
    use domain::{Aggregate, OrderEvent};
    use event_store::{InMemoryEventStore, Version};

    const WINDOW: Duration = Duration::from_secs(900);

    fn manager() -> OrderProcessManager<InMemoryEventStore, InMemoryCommandScheduler> {
        OrderProcessManager::new(
            InMemoryEventStore::new(),
            InMemoryCommandScheduler::new(),
            WINDOW,
        )
    }

    fn placed(tickets: u32) -> OrderPlacedData {
        match OrderEvent::order_placed(OrderId::new(), ConferenceId::new(), tickets) {
            OrderEvent::OrderPlaced(data) => data,
            other => panic!("unexpected event {other:?}"),
        }
    }

    async fn state_of(
        manager: &OrderProcessManager<InMemoryEventStore, InMemoryCommandScheduler>,
        order_id: OrderId,
    ) -> Option<ProcessState> {
        manager
            .get_process(order_id)
            .await
            .unwrap()
            .and_then(|p| p.state())
    }

    #[tokio::test]
    async fn test_order_placed_requests_seats_and_schedules_expiry() {
        let manager = manager();
        let placed = placed(2);

        let commands = manager.on_order_placed(&placed).await.unwrap();

        assert_eq!(
            commands,
            vec![SagaCommand::reserve(placed.conference_id, placed.order_id, 2)]
        );
        assert_eq!(
            state_of(&manager, placed.order_id).await,
            Some(ProcessState::AwaitingReservationConfirmation)
        );

        let pending = manager.scheduler().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fire_after, WINDOW);
        assert_eq!(
            pending[0].command,
            ScheduledCommand::ExpireOrder(ExpireOrder::new(placed.order_id))
        );

        let process = manager.get_process(placed.order_id).await.unwrap().unwrap();
        assert_eq!(process.expiry_token(), Some(pending[0].token));
    }

    #[tokio::test]
    async fn test_redelivered_order_placed_resends_seat_request() {
        let manager = manager();
        let placed = placed(2);
        let order_id = placed.order_id;

        let first = manager.on_order_placed(&placed).await.unwrap();
        let again = manager.on_order_placed(&placed).await.unwrap();

        assert_eq!(again, first);
        assert_eq!(manager.scheduler().pending().len(), 1);

        manager
            .on_reservation_accepted(ReservationId::from(order_id))
            .await
            .unwrap();
        manager
            .on_payment_received(&PaymentReceived::new(order_id, 20.0, "merchant-1"))
            .await
            .unwrap();
        assert!(manager.on_order_placed(&placed).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scheduler_failure_does_not_block_placement() {
        let manager = OrderProcessManager::new(
            InMemoryEventStore::new(),
            InMemoryCommandScheduler::unavailable(),
            WINDOW,
        );
        let placed = placed(1);

        let commands = manager.on_order_placed(&placed).await.unwrap();

        assert_eq!(commands.len(), 1);
        let process = manager.get_process(placed.order_id).await.unwrap().unwrap();
        assert!(process.expiry_token().is_none());
    }

    #[tokio::test]
    async fn test_accepted_then_paid() {
        let manager = manager();
        let placed = placed(2);
        let order_id = placed.order_id;
        manager.on_order_placed(&placed).await.unwrap();
        let token = manager.scheduler().pending()[0].token;

        let commands = manager
            .on_reservation_accepted(ReservationId::from(order_id))
            .await
            .unwrap();
        assert_eq!(
            commands,
            vec![SagaCommand::MarkAsBooked(MarkAsBooked::new(order_id))]
        );
        assert!(manager.admit_expiry(order_id).await.unwrap());

        let commands = manager
            .on_payment_received(&PaymentReceived::new(order_id, 100.0, "merchant-1"))
            .await
            .unwrap();
        assert_eq!(
            commands,
            vec![SagaCommand::commit(placed.conference_id, order_id)]
        );
        assert_eq!(state_of(&manager, order_id).await, Some(ProcessState::Completed));
        assert!(manager.scheduler().was_cancelled(token));
        assert!(!manager.admit_expiry(order_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_reservation_rejects_order() {
        let manager = manager();
        let placed = placed(3);
        let order_id = placed.order_id;
        manager.on_order_placed(&placed).await.unwrap();

        let commands = manager
            .on_reservation_rejected(ReservationId::from(order_id))
            .await
            .unwrap();

        assert_eq!(
            commands,
            vec![SagaCommand::RejectOrder(RejectOrder::new(order_id))]
        );
        assert_eq!(state_of(&manager, order_id).await, Some(ProcessState::Rejected));
        assert!(manager.scheduler().pending().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_compensates() {
        let manager = manager();
        let placed = placed(2);
        let order_id = placed.order_id;
        manager.on_order_placed(&placed).await.unwrap();
        manager
            .on_reservation_accepted(ReservationId::from(order_id))
            .await
            .unwrap();

        let commands = manager.on_order_expired(order_id).await.unwrap();

        assert_eq!(
            commands,
            vec![
                SagaCommand::cancel(placed.conference_id, order_id),
                SagaCommand::RejectOrder(RejectOrder::new(order_id)),
            ]
        );
        assert_eq!(state_of(&manager, order_id).await, Some(ProcessState::Expired));
    }

    #[tokio::test]
    async fn test_redelivered_events_resend_follow_up_commands() {
        let manager = manager();
        let placed = placed(1);
        let order_id = placed.order_id;
        manager.on_order_placed(&placed).await.unwrap();
        let reservation_id = ReservationId::from(order_id);

        let first = manager.on_reservation_accepted(reservation_id).await.unwrap();
        assert_eq!(manager.on_reservation_accepted(reservation_id).await.unwrap(), first);

        let payment = PaymentReceived::new(order_id, 50.0, "merchant-1");
        let first = manager.on_payment_received(&payment).await.unwrap();
        assert_eq!(manager.on_payment_received(&payment).await.unwrap(), first);

        let process = manager.get_process(order_id).await.unwrap().unwrap();
        assert_eq!(process.state(), Some(ProcessState::Completed));
        assert_eq!(process.version(), Version::new(4));
    }

    #[tokio::test]
    async fn test_events_after_another_ending_are_noops() {
        let manager = manager();
        let placed = placed(1);
        let order_id = placed.order_id;
        let reservation_id = ReservationId::from(order_id);
        manager.on_order_placed(&placed).await.unwrap();
        manager.on_reservation_accepted(reservation_id).await.unwrap();
        manager
            .on_payment_received(&PaymentReceived::new(order_id, 50.0, "merchant-1"))
            .await
            .unwrap();

        assert!(manager.on_order_expired(order_id).await.unwrap().is_empty());
        assert!(manager.on_reservation_rejected(reservation_id).await.unwrap().is_empty());
        assert_eq!(state_of(&manager, order_id).await, Some(ProcessState::Completed));
    }

    #[tokio::test]
    async fn test_redelivered_expiry_repeats_compensation() {
        let manager = manager();
        let placed = placed(2);
        let order_id = placed.order_id;
        manager.on_order_placed(&placed).await.unwrap();
        manager
            .on_reservation_accepted(ReservationId::from(order_id))
            .await
            .unwrap();

        let first = manager.on_order_expired(order_id).await.unwrap();
        assert!(manager.admit_expiry(order_id).await.unwrap());
        let again = manager.on_order_expired(order_id).await.unwrap();

        assert_eq!(again, first);
        assert_eq!(state_of(&manager, order_id).await, Some(ProcessState::Expired));
    }

    #[tokio::test]
    async fn test_out_of_order_payment_is_ignored() {
        let manager = manager();
        let placed = placed(1);
        manager.on_order_placed(&placed).await.unwrap();

        let commands = manager
            .on_payment_received(&PaymentReceived::new(placed.order_id, 10.0, "m"))
            .await
            .unwrap();

        assert!(commands.is_empty());
        assert_eq!(
            state_of(&manager, placed.order_id).await,
            Some(ProcessState::AwaitingReservationConfirmation)
        );
        assert!(!manager.admit_expiry(placed.order_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_contradicting_event_is_an_error() {
        let manager = manager();
        let placed = placed(1);
        let reservation_id = ReservationId::from(placed.order_id);
        manager.on_order_placed(&placed).await.unwrap();
        manager.on_reservation_accepted(reservation_id).await.unwrap();

        let result = manager.on_reservation_rejected(reservation_id).await;

        assert!(matches!(
            result,
            Err(SagaError::InvalidOperation {
                from: Some(ProcessState::AwaitingPayment),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_events_for_unknown_processes_are_ignored() {
        let manager = manager();
        let order_id = OrderId::new();

        assert!(manager
            .on_reservation_accepted(ReservationId::from(order_id))
            .await
            .unwrap()
            .is_empty());
        assert!(manager.on_order_expired(order_id).await.unwrap().is_empty());
        assert!(!manager.admit_expiry(order_id).await.unwrap());
        assert!(manager.get_process(order_id).await.unwrap().is_none());
    }
}
