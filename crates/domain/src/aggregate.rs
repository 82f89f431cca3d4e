//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events are facts: immutable and named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name used for storage and routing.
    fn event_type(&self) -> &'static str;

    /// Returns the id of the workflow instance this event belongs to, if any.
    ///
    /// Stamped onto the stored envelope so related streams can be joined.
    fn correlation_id(&self) -> Option<String> {
        None
    }
}

/// Trait for event-sourced aggregates.
///
/// State is never written directly. Command methods inspect the current
/// state and return the events they want recorded (the uncommitted buffer);
/// the command handler persists that buffer and folds it back in through
/// [`Aggregate::apply`].
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name used for stream organization.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's stream id, or None before its first event.
    fn id(&self) -> Option<AggregateId>;

    /// Returns the version of the last applied event (0 for a new aggregate).
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate.
    ///
    /// Must be pure, deterministic and infallible: events are facts that
    /// already happened.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Rebuilds an aggregate by folding its full history over the initial state.
    fn from_history(history: impl IntoIterator<Item = Self::Event>) -> Self {
        let mut aggregate = Self::default();
        let mut version = Version::initial();
        for event in history {
            aggregate.apply(event);
            version = version.next();
        }
        aggregate.set_version(version);
        aggregate
    }
}

/// Trait for aggregates that support snapshotting.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Number of events between snapshots.
    fn snapshot_interval() -> usize {
        100
    }

    fn should_snapshot(&self) -> bool {
        self.version().as_i64() > 0
            && (self.version().as_i64() as usize).is_multiple_of(Self::snapshot_interval())
    }
}
