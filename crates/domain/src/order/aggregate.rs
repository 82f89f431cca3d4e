//! Order aggregate implementation.

use common::{AggregateId, ConferenceId, OrderId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{OrderError, OrderEvent, OrderState, events::OrderPlacedData};

/// Order aggregate root.
///
/// A request for a number of tickets to one conference. Its lifecycle is
/// driven by the order process manager: booked once seats are reserved,
/// rejected when they are not, and expired when the payment window elapses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<OrderId>,

    #[serde(default)]
    version: Version,

    conference_id: Option<ConferenceId>,

    number_of_tickets: u32,

    state: OrderState,

    /// Set once OrderExpired has been recorded.
    #[serde(default)]
    expired: bool,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(Into::into)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::MarkedAsBooked(_) => {
                self.state = OrderState::Booked;
            }
            OrderEvent::OrderRejected(_) => {
                self.state = OrderState::Rejected;
            }
            OrderEvent::OrderExpired(_) => {
                self.expired = true;
            }
        }
    }
}

// Query methods
impl Order {
    pub fn order_id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn conference_id(&self) -> Option<ConferenceId> {
        self.conference_id
    }

    pub fn number_of_tickets(&self) -> u32 {
        self.number_of_tickets
    }

    /// Returns the current state.
    pub fn state(&self) -> OrderState {
        self.state
    }

    /// Returns true once the order has been expired.
    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

// Command methods (return events)
impl Order {
    /// Places the order.
    ///
    /// Placing an already placed order with identical details records nothing;
    /// any other detail is refused.
    pub fn place(
        &self,
        order_id: OrderId,
        conference_id: ConferenceId,
        number_of_tickets: u32,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if number_of_tickets == 0 {
            return Err(OrderError::InvalidTicketCount {
                count: number_of_tickets,
            });
        }

        if let Some(existing) = self.id {
            let same = existing == order_id
                && self.conference_id == Some(conference_id)
                && self.number_of_tickets == number_of_tickets;
            return if same {
                Ok(vec![])
            } else {
                Err(OrderError::AlreadyPlaced { order_id: existing })
            };
        }

        Ok(vec![OrderEvent::order_placed(
            order_id,
            conference_id,
            number_of_tickets,
        )])
    }

    /// Marks the order as booked.
    pub fn mark_as_booked(&self) -> Result<Vec<OrderEvent>, OrderError> {
        let order_id = self.require_transition(self.state.can_mark_as_booked(), "mark as booked")?;
        Ok(vec![OrderEvent::marked_as_booked(order_id)])
    }

    /// Rejects the order.
    pub fn reject(&self) -> Result<Vec<OrderEvent>, OrderError> {
        let order_id = self.require_transition(self.state.can_reject(), "reject")?;
        Ok(vec![OrderEvent::order_rejected(order_id)])
    }

    /// Expires the order. Repeating an expiry records nothing.
    pub fn expire(&self) -> Result<Vec<OrderEvent>, OrderError> {
        if self.expired {
            return Ok(vec![]);
        }
        let order_id = self.require_transition(self.state.can_expire(), "expire")?;
        Ok(vec![OrderEvent::order_expired(order_id)])
    }

    fn require_transition(&self, allowed: bool, action: &'static str) -> Result<OrderId, OrderError> {
        match self.id {
            Some(order_id) if allowed => Ok(order_id),
            _ => Err(OrderError::InvalidState {
                current_state: self.state,
                action,
            }),
        }
    }
}

// Event application helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.conference_id = Some(data.conference_id);
        self.number_of_tickets = data.number_of_tickets;
        self.state = OrderState::New;
    }
}
