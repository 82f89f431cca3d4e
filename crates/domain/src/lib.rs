//! Domain layer for conference ticket orders.
//!
//! This crate provides:
//! - the aggregate base contract (fold over history, pure decide functions)
//! - a command handler with per-aggregate serialization and conflict retry
//! - the `Order` aggregate
//! - the `SeatsAvailability` aggregate guarding a conference's seat inventory

pub mod aggregate;
pub mod command;
pub mod error;
mod locks;
pub mod order;
pub mod seats;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use command::{Command, CommandHandler, CommandResult, RetryPolicy};
pub use error::DomainError;
pub use order::{
    ExpireOrder, MarkAsBooked, Order, OrderError, OrderEvent, OrderService, OrderState,
    PlaceOrder, RejectOrder,
};
pub use seats::{
    CancelSeatReservation, CommitSeatReservation, CreateSeatsAvailability, MakeSeatReservation,
    Reservation, ReservationOutcome, ReservationResult, ReservationStatus, SeatsAvailability,
    SeatsAvailabilityService, SeatsError, SeatsEvent,
};
