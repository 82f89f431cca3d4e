//! Published events and the subscription table that routes them.

use std::collections::HashMap;

use common::OrderId;
use domain::{DomainEvent, OrderEvent, SeatsEvent};
use saga::PaymentReceived;

/// An event published inside the ordering context.
#[derive(Debug, Clone, PartialEq)]
pub enum Published {
    Order(OrderEvent),
    Seats(SeatsEvent),
    PaymentReceived(PaymentReceived),
}

impl Published {
    pub fn kind(&self) -> EventKind {
        match self {
            Published::Order(OrderEvent::OrderPlaced(_)) => EventKind::OrderPlaced,
            Published::Order(OrderEvent::MarkedAsBooked(_)) => EventKind::MarkedAsBooked,
            Published::Order(OrderEvent::OrderRejected(_)) => EventKind::OrderRejected,
            Published::Order(OrderEvent::OrderExpired(_)) => EventKind::OrderExpired,
            Published::Seats(SeatsEvent::SeatsAvailabilityCreated(_)) => {
                EventKind::SeatsAvailabilityCreated
            }
            Published::Seats(SeatsEvent::ReservationAccepted(_)) => EventKind::ReservationAccepted,
            Published::Seats(SeatsEvent::ReservationRejected(_)) => EventKind::ReservationRejected,
            Published::Seats(SeatsEvent::ReservationCommitted(_)) => {
                EventKind::ReservationCommitted
            }
            Published::Seats(SeatsEvent::ReservationCancelled(_)) => {
                EventKind::ReservationCancelled
            }
            Published::PaymentReceived(_) => EventKind::PaymentReceived,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Published::Order(event) => event.event_type(),
            Published::Seats(event) => event.event_type(),
            Published::PaymentReceived(_) => "PaymentReceived",
        }
    }

    /// The order this event belongs to, when it belongs to one.
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Published::Order(event) => Some(event.order_id()),
            Published::Seats(event) => event.reservation_id().map(OrderId::from),
            Published::PaymentReceived(payment) => Some(payment.order_id),
        }
    }
}

/// Routing key of the subscription table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OrderPlaced,
    MarkedAsBooked,
    OrderRejected,
    OrderExpired,
    SeatsAvailabilityCreated,
    ReservationAccepted,
    ReservationRejected,
    ReservationCommitted,
    ReservationCancelled,
    PaymentReceived,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::OrderPlaced,
        EventKind::MarkedAsBooked,
        EventKind::OrderRejected,
        EventKind::OrderExpired,
        EventKind::SeatsAvailabilityCreated,
        EventKind::ReservationAccepted,
        EventKind::ReservationRejected,
        EventKind::ReservationCommitted,
        EventKind::ReservationCancelled,
        EventKind::PaymentReceived,
    ];
}

/// Something that reacts to published events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscriber {
    /// Writes every event to the log.
    AuditLog,
    /// Forwards workflow events to the order process manager.
    ProcessManager,
}

/// Event kind to subscribers, resolved once at start-up.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    table: HashMap<EventKind, Vec<Subscriber>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table used by the application: audit log for everything, the
    /// process manager for the events that drive the order workflow.
    pub fn standard() -> Self {
        let mut subscriptions = Self::new();
        for kind in EventKind::ALL {
            subscriptions.subscribe(kind, Subscriber::AuditLog);
        }
        for kind in [
            EventKind::OrderPlaced,
            EventKind::OrderExpired,
            EventKind::ReservationAccepted,
            EventKind::ReservationRejected,
            EventKind::PaymentReceived,
        ] {
            subscriptions.subscribe(kind, Subscriber::ProcessManager);
        }
        subscriptions
    }

    pub fn subscribe(&mut self, kind: EventKind, subscriber: Subscriber) {
        let subscribers = self.table.entry(kind).or_default();
        if !subscribers.contains(&subscriber) {
            subscribers.push(subscriber);
        }
    }

    pub fn subscribers(&self, kind: EventKind) -> &[Subscriber] {
        self.table.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Logs a published event with its identifying fields.
pub fn log_event(event: &Published) {
    let order_id = event.order_id().map(|id| id.to_string()).unwrap_or_default();
    match event {
        Published::Order(OrderEvent::OrderPlaced(data)) => tracing::info!(
            event_type = event.event_type(),
            %order_id,
            conference_id = %data.conference_id,
            number_of_tickets = data.number_of_tickets,
            "event published"
        ),
        Published::Seats(seats) => tracing::info!(
            event_type = event.event_type(),
            %order_id,
            conference_id = %seats.conference_id(),
            "event published"
        ),
        Published::PaymentReceived(payment) => tracing::info!(
            event_type = event.event_type(),
            %order_id,
            paid_amount = payment.paid_amount,
            merchant_id = %payment.merchant_id,
            "event published"
        ),
        Published::Order(_) => tracing::info!(
            event_type = event.event_type(),
            %order_id,
            "event published"
        ),
    }
    metrics::counter!("events_published_total", "event_type" => event.event_type()).increment(1);
}
