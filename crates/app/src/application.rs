//! Application context.
//!
//! Built once at start-up and shared by handle. Owns the services, the process
//! manager and the subscription table, and runs every request as a work-queue
//! drain: commands publish events, events reach their subscribers, and the
//! process manager's answers are queued as further commands.
//!
//! A command that finds its work already recorded publishes nothing by
//! itself. For the commands the workflow hangs on (placing, expiring and
//! reserving) the recorded event is published again instead, so a retried
//! request picks the workflow up where an earlier failure left it.

use std::collections::VecDeque;
use std::time::Duration;

use common::{AggregateId, ConferenceId, OrderId, ReservationId};
use domain::{
    CreateSeatsAvailability, DomainError, DomainEvent, ExpireOrder, Order, OrderEvent, OrderService,
    PlaceOrder, SeatsAvailability, SeatsAvailabilityService, SeatsEvent,
};
use event_store::{EventEnvelope, EventStore};
use saga::{
    CommandScheduler, OrderProcessManager, OrderProcessState, SagaCommand, SagaError,
    ScheduledCommand,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::dispatch::{Published, Subscriber, Subscriptions, log_event};
use crate::intake::{ConferenceCreated, PaymentReceivedPayload};

/// Errors returned by application operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request or integration message is malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A referenced order or conference does not exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl AppError {
    /// Returns true for transient failures worth delivering again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Domain(e) | AppError::Saga(SagaError::Domain(e)) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// One unit of pending work in a drain.
#[derive(Debug)]
enum Work {
    Place(PlaceOrder),
    Expire(ExpireOrder),
    Saga(SagaCommand),
    Publish(Published),
}

/// The ordering context wired together.
pub struct Application<S: EventStore, C: CommandScheduler> {
    store: S,
    orders: OrderService<S>,
    seats: SeatsAvailabilityService<S>,
    manager: OrderProcessManager<S, C>,
    subscriptions: Subscriptions,
    scheduled_retry_delay: Duration,
}

impl<S, C> Application<S, C>
where
    S: EventStore + Clone,
    C: CommandScheduler,
{
    /// Wires the context on top of `store`, with `scheduler` delivering
    /// payment timeouts.
    pub fn new(store: S, scheduler: C, config: &Config) -> Self {
        let retry = config.retry_policy();
        Self {
            orders: OrderService::new(store.clone()).with_retry_policy(retry),
            seats: SeatsAvailabilityService::new(store.clone()).with_retry_policy(retry),
            manager: OrderProcessManager::new(store.clone(), scheduler, config.payment_window)
                .with_retry_policy(retry),
            subscriptions: Subscriptions::standard(),
            scheduled_retry_delay: config.scheduled_retry_delay,
            store,
        }
    }

    pub fn scheduler(&self) -> &C {
        self.manager.scheduler()
    }

    /// Places an order for an existing conference and runs the workflow as
    /// far as it goes without outside input.
    ///
    /// Returns the events published along the way, in order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, conference_id = %cmd.conference_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Vec<Published>> {
        if self.seats.get_availability(cmd.conference_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Conference {}",
                cmd.conference_id
            )));
        }
        self.drain(vec![Work::Place(cmd)]).await
    }

    /// Asks for an order to expire now.
    ///
    /// Goes through the same gate as the scheduled timeout: only an order
    /// waiting for payment is affected. Asking again for an order that
    /// already expired republishes its `OrderExpired` so an unfinished
    /// compensation completes; anything else publishes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn expire_order(&self, order_id: OrderId) -> Result<Vec<Published>> {
        if self.orders.get_order(order_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Order {order_id}")));
        }
        self.drain(vec![Work::Expire(ExpireOrder::new(order_id))]).await
    }

    /// Consumes a raw `ConferenceCreated` integration event.
    ///
    /// Publishes `SeatsAvailabilityCreated` for a new conference; a known one
    /// publishes nothing.
    #[tracing::instrument(skip(self, raw))]
    pub async fn consume_conference_created(&self, raw: &str) -> Result<Vec<Published>> {
        let event = ConferenceCreated::parse(raw)?;
        let conference_id = event.conference_id()?;

        let recorded = self
            .seats
            .create_if_absent(CreateSeatsAvailability::new(
                conference_id,
                event.available_tickets,
            ))
            .await?;

        if recorded.is_empty() {
            tracing::debug!(%conference_id, "duplicate ConferenceCreated ignored");
        } else {
            tracing::info!(
                %conference_id,
                name = %event.name,
                available_tickets = event.available_tickets,
                "seats availability created"
            );
        }
        self.drain(seats_events(recorded)).await
    }

    /// Consumes a raw `PaymentReceived` integration event.
    #[tracing::instrument(skip(self, raw))]
    pub async fn consume_payment_received(&self, raw: &str) -> Result<Vec<Published>> {
        let payment = PaymentReceivedPayload::parse(raw)?.into_event()?;
        self.drain(vec![Work::Publish(Published::PaymentReceived(payment))])
            .await
    }

    /// Runs a command handed back by the scheduler.
    #[tracing::instrument(skip(self))]
    pub async fn deliver_scheduled(&self, command: ScheduledCommand) -> Result<Vec<Published>> {
        match command {
            ScheduledCommand::ExpireOrder(cmd) => self.drain(vec![Work::Expire(cmd)]).await,
        }
    }

    /// Delivers scheduled commands until the scheduler side is dropped.
    ///
    /// A delivery that fails transiently is handed back to the scheduler and
    /// arrives again after the configured retry delay. Any other failure is
    /// dead-lettered: logged, counted and dropped. Neither stops the loop.
    pub async fn run_scheduled_intake(&self, mut receiver: mpsc::UnboundedReceiver<ScheduledCommand>) {
        while let Some(command) = receiver.recv().await {
            let Err(e) = self.deliver_scheduled(command).await else {
                continue;
            };

            if e.is_retryable() {
                match self.scheduler().schedule(command, self.scheduled_retry_delay) {
                    Ok(token) => {
                        metrics::counter!("scheduled_delivery_failures_total", "outcome" => "retried")
                            .increment(1);
                        tracing::warn!(
                            ?command,
                            %token,
                            delay = ?self.scheduled_retry_delay,
                            error = %e,
                            "scheduled command failed, delivering again later"
                        );
                        continue;
                    }
                    Err(schedule_error) => {
                        tracing::error!(?command, error = %schedule_error, "could not reschedule");
                    }
                }
            }

            metrics::counter!("scheduled_delivery_failures_total", "outcome" => "dead_lettered")
                .increment(1);
            tracing::error!(?command, error = %e, "scheduled command dead-lettered");
        }
        tracing::info!("scheduled command intake closed");
    }

    pub async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.get_order(order_id).await?)
    }

    pub async fn process_state(&self, order_id: OrderId) -> Result<Option<OrderProcessState>> {
        Ok(self.manager.get_process(order_id).await?)
    }

    pub async fn seats_availability(
        &self,
        conference_id: ConferenceId,
    ) -> Result<Option<SeatsAvailability>> {
        Ok(self.seats.get_availability(conference_id).await?)
    }

    /// Stored events of an order and of its process, oldest first.
    pub async fn order_history(&self, order_id: OrderId) -> Result<Vec<EventEnvelope>> {
        let mut history = self
            .store
            .get_events_for_aggregate(order_id.into())
            .await
            .map_err(DomainError::from)?;
        history.extend(
            self.store
                .get_events_for_aggregate(OrderProcessState::stream_id(order_id))
                .await
                .map_err(DomainError::from)?,
        );
        history.sort_by_key(|envelope| envelope.timestamp);
        Ok(history)
    }

    async fn drain(&self, work: Vec<Work>) -> Result<Vec<Published>> {
        let mut queue = VecDeque::from(work);
        let mut published = Vec::new();

        while let Some(work) = queue.pop_front() {
            match work {
                Work::Place(cmd) => {
                    let order_id = cmd.order_id;
                    let result = self.orders.place_order(cmd).await?;
                    if result.is_noop() {
                        queue.extend(self.resend_order_event(order_id, "OrderPlaced").await?);
                    } else {
                        queue.extend(order_events(result.events));
                    }
                }
                Work::Expire(cmd) => {
                    if self.manager.admit_expiry(cmd.order_id).await? {
                        let result = self.orders.expire_order(cmd).await?;
                        if result.is_noop() {
                            queue.extend(
                                self.resend_order_event(cmd.order_id, "OrderExpired").await?,
                            );
                        } else {
                            queue.extend(order_events(result.events));
                        }
                    }
                }
                Work::Saga(command) => {
                    tracing::debug!(command = command.name(), "running saga command");
                    queue.extend(self.run(command).await?);
                }
                Work::Publish(event) => {
                    for subscriber in self.subscriptions.subscribers(event.kind()) {
                        let commands = self.notify(*subscriber, &event).await?;
                        queue.extend(commands.into_iter().map(Work::Saga));
                    }
                    published.push(event);
                }
            }
        }

        Ok(published)
    }

    async fn run(&self, command: SagaCommand) -> Result<Vec<Work>> {
        let work = match command {
            SagaCommand::MakeSeatReservation(cmd) => {
                let result = self.seats.make_reservation(cmd).await?;
                if result.events.is_empty() {
                    self.resend_reservation_outcome(cmd.conference_id, cmd.reservation_id)
                        .await?
                        .into_iter()
                        .collect::<Vec<_>>()
                } else {
                    seats_events(result.events)
                }
            }
            SagaCommand::CommitSeatReservation(cmd) => {
                seats_events(self.seats.commit_reservation(cmd).await?.events)
            }
            SagaCommand::CancelSeatReservation(cmd) => {
                seats_events(self.seats.cancel_reservation(cmd).await?.events)
            }
            SagaCommand::MarkAsBooked(cmd) => {
                order_events(self.orders.mark_as_booked(cmd).await?.events)
            }
            SagaCommand::RejectOrder(cmd) => {
                order_events(self.orders.reject_order(cmd).await?.events)
            }
        };
        Ok(work)
    }

    async fn notify(&self, subscriber: Subscriber, event: &Published) -> Result<Vec<SagaCommand>> {
        match subscriber {
            Subscriber::AuditLog => {
                log_event(event);
                Ok(vec![])
            }
            Subscriber::ProcessManager => {
                let commands = match event {
                    Published::Order(OrderEvent::OrderPlaced(data)) => {
                        self.manager.on_order_placed(data).await?
                    }
                    Published::Order(OrderEvent::OrderExpired(data)) => {
                        self.manager.on_order_expired(data.order_id).await?
                    }
                    Published::Seats(SeatsEvent::ReservationAccepted(data)) => {
                        self.manager.on_reservation_accepted(data.reservation_id).await?
                    }
                    Published::Seats(SeatsEvent::ReservationRejected(data)) => {
                        self.manager.on_reservation_rejected(data.reservation_id).await?
                    }
                    Published::PaymentReceived(payment) => {
                        self.manager.on_payment_received(payment).await?
                    }
                    _ => vec![],
                };
                Ok(commands)
            }
        }
    }

    /// The recorded `event_type` event of an order, queued for publishing again.
    async fn resend_order_event(&self, order_id: OrderId, event_type: &str) -> Result<Option<Work>> {
        let event = self
            .latest_recorded(order_id.into(), &[event_type], |_: &OrderEvent| true)
            .await?;
        if event.is_some() {
            tracing::debug!(%order_id, event_type, "resending recorded event");
        }
        Ok(event.map(|event| Work::Publish(Published::Order(event))))
    }

    /// The recorded answer to a reservation request, queued for publishing again.
    async fn resend_reservation_outcome(
        &self,
        conference_id: ConferenceId,
        reservation_id: ReservationId,
    ) -> Result<Option<Work>> {
        let event = self
            .latest_recorded(
                conference_id.into(),
                &["ReservationAccepted", "ReservationRejected"],
                |event: &SeatsEvent| event.reservation_id() == Some(reservation_id),
            )
            .await?;
        if let Some(event) = &event {
            tracing::debug!(%reservation_id, event_type = event.event_type(), "resending recorded event");
        }
        Ok(event.map(|event| Work::Publish(Published::Seats(event))))
    }

    /// Newest event on `stream` whose type is one of `event_types` and that
    /// `wanted` accepts.
    async fn latest_recorded<E: DeserializeOwned>(
        &self,
        stream: AggregateId,
        event_types: &[&str],
        wanted: impl Fn(&E) -> bool,
    ) -> Result<Option<E>> {
        let history = self
            .store
            .get_events_for_aggregate(stream)
            .await
            .map_err(DomainError::from)?;

        for envelope in history.into_iter().rev() {
            if !event_types.contains(&envelope.event_type.as_str()) {
                continue;
            }
            let event: E = serde_json::from_value(envelope.payload).map_err(DomainError::from)?;
            if wanted(&event) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

fn order_events(events: Vec<OrderEvent>) -> Vec<Work> {
    events
        .into_iter()
        .map(|event| Work::Publish(Published::Order(event)))
        .collect()
}

fn seats_events(events: Vec<SeatsEvent>) -> Vec<Work> {
    events
        .into_iter()
        .map(|event| Work::Publish(Published::Seats(event)))
        .collect()
}
