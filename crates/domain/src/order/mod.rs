//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::Order;
pub use commands::*;
pub use events::{
    MarkedAsBookedData, OrderEvent, OrderExpiredData, OrderPlacedData, OrderRejectedData,
};
pub use service::OrderService;
pub use state::OrderState;

use common::OrderId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidState {
        current_state: OrderState,
        action: &'static str,
    },

    /// An order must ask for at least one ticket.
    #[error("Invalid ticket count: {count} (must be greater than 0)")]
    InvalidTicketCount { count: u32 },

    /// The order id was already placed with different data.
    #[error("Order {order_id} was already placed with different details")]
    AlreadyPlaced { order_id: OrderId },
}
