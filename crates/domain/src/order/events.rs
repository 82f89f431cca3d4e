//! Order domain events.

use chrono::{DateTime, Utc};
use common::{ConferenceId, OrderId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed for a conference.
    OrderPlaced(OrderPlacedData),

    /// Seats were reserved for the order.
    MarkedAsBooked(MarkedAsBookedData),

    /// Order was rejected.
    OrderRejected(OrderRejectedData),

    /// Payment window elapsed or expiry was requested.
    OrderExpired(OrderExpiredData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::MarkedAsBooked(_) => "MarkedAsBooked",
            OrderEvent::OrderRejected(_) => "OrderRejected",
            OrderEvent::OrderExpired(_) => "OrderExpired",
        }
    }

    fn correlation_id(&self) -> Option<String> {
        Some(self.order_id().to_string())
    }
}

impl OrderEvent {
    /// Returns the order this event belongs to.
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderPlaced(data) => data.order_id,
            OrderEvent::MarkedAsBooked(data) => data.order_id,
            OrderEvent::OrderRejected(data) => data.order_id,
            OrderEvent::OrderExpired(data) => data.order_id,
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,

    /// The conference the tickets are for.
    pub conference_id: ConferenceId,

    pub number_of_tickets: u32,

    pub placed_at: DateTime<Utc>,
}

/// Data for MarkedAsBooked event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkedAsBookedData {
    pub order_id: OrderId,
    pub booked_at: DateTime<Utc>,
}

/// Data for OrderRejected event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejectedData {
    pub order_id: OrderId,
    pub rejected_at: DateTime<Utc>,
}

/// Data for OrderExpired event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExpiredData {
    pub order_id: OrderId,
    pub expired_at: DateTime<Utc>,
}

// Convenience constructors
impl OrderEvent {
    pub fn order_placed(
        order_id: OrderId,
        conference_id: ConferenceId,
        number_of_tickets: u32,
    ) -> Self {
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            conference_id,
            number_of_tickets,
            placed_at: Utc::now(),
        })
    }

    pub fn marked_as_booked(order_id: OrderId) -> Self {
        OrderEvent::MarkedAsBooked(MarkedAsBookedData {
            order_id,
            booked_at: Utc::now(),
        })
    }

    pub fn order_rejected(order_id: OrderId) -> Self {
        OrderEvent::OrderRejected(OrderRejectedData {
            order_id,
            rejected_at: Utc::now(),
        })
    }

    pub fn order_expired(order_id: OrderId) -> Self {
        OrderEvent::OrderExpired(OrderExpiredData {
            order_id,
            expired_at: Utc::now(),
        })
    }
}
