//! Order process manager (saga) for conference ticket orders.
//!
//! An order and the seat inventory it draws from live in separate aggregates
//! and are never updated together. This crate keeps them consistent:
//!
//! 1. `OrderPlaced` starts a process and requests seats
//! 2. `ReservationAccepted` books the order, `ReservationRejected` rejects it
//! 3. `PaymentReceived` commits the seats
//! 4. A scheduled `ExpireOrder` releases the seats and rejects the order when
//!    payment never arrives
//!
//! The process state is event-sourced and doubles as the workflow audit trail.
//! Handlers return [`SagaCommand`]s; running them is up to the caller.

pub mod aggregate;
pub mod commands;
pub mod error;
pub mod events;
pub mod inbound;
pub mod manager;
pub mod scheduler;
pub mod state;

pub use aggregate::OrderProcessState;
pub use commands::SagaCommand;
pub use error::SagaError;
pub use events::ProcessEvent;
pub use inbound::PaymentReceived;
pub use manager::OrderProcessManager;
pub use scheduler::{
    CommandScheduler, InMemoryCommandScheduler, PendingCommand, ScheduleToken, ScheduledCommand,
    SchedulerError, TokioCommandScheduler,
};
pub use state::{Inbound, ProcessState, Transition};
