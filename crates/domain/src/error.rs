//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::order::OrderError;
use crate::seats::SeatsError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Seats availability error: {0}")]
    Seats(#[from] SeatsError),

    /// A command targeted a stream with no events.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// A conditional create lost against an existing stream.
    #[error("Aggregate already exists: {aggregate_type} with id {aggregate_id}")]
    AlreadyExists {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// Every attempt to append hit a concurrent writer.
    #[error("Gave up on aggregate {aggregate_id} after {attempts} conflicting attempts")]
    ConcurrencyRetriesExhausted {
        aggregate_id: AggregateId,
        attempts: u32,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true for transient failures the caller may retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::ConcurrencyRetriesExhausted { .. }
                | DomainError::EventStore(
                    EventStoreError::ConcurrencyConflict { .. } | EventStoreError::Unavailable(_)
                )
        )
    }

    /// Returns true if the command was refused because of the aggregate's current state.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            DomainError::Order(OrderError::InvalidState { .. })
                | DomainError::Seats(SeatsError::InvalidState { .. })
        )
    }
}
