//! Shared identifier types.
//!
//! Every identifier is a UUID newtype so that an order id can never be passed
//! where a conference id is expected.

mod ids;

pub use ids::{AggregateId, ConferenceId, OrderId, ReservationId};
