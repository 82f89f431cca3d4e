//! Event storage boundary.
//!
//! Streams are keyed by [`AggregateId`] and versioned from 1. Appends carry an
//! expected version; `AppendOptions::expect_new` doubles as a conditional
//! create, which is what makes first-writer-wins aggregate creation possible.

pub mod error;
pub mod event;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{CORRELATION_ID_KEY, EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt};
