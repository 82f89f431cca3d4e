//! Order commands.

use common::{AggregateId, ConferenceId, OrderId};
use serde::{Deserialize, Serialize};

use crate::command::Command;

use super::Order;

/// Command to place a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub conference_id: ConferenceId,
    pub number_of_tickets: u32,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(order_id: OrderId, conference_id: ConferenceId, number_of_tickets: u32) -> Self {
        Self {
            order_id,
            conference_id,
            number_of_tickets,
        }
    }

    /// Creates a PlaceOrder command with a generated order ID.
    pub fn for_conference(conference_id: ConferenceId, number_of_tickets: u32) -> Self {
        Self::new(OrderId::new(), conference_id, number_of_tickets)
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id.into()
    }
}

/// Command to mark an order as booked once seats are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAsBooked {
    pub order_id: OrderId,
}

impl MarkAsBooked {
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id }
    }
}

impl Command for MarkAsBooked {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id.into()
    }
}

/// Command to reject an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectOrder {
    pub order_id: OrderId,
}

impl RejectOrder {
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id }
    }
}

impl Command for RejectOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id.into()
    }
}

/// Command to expire an order whose payment window has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireOrder {
    pub order_id: OrderId,
}

impl ExpireOrder {
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id }
    }
}

impl Command for ExpireOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id.into()
    }
}
