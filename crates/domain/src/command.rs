//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Version};
use serde::de::DeserializeOwned;

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;
use crate::locks::KeyedLocks;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted. Empty for a no-op.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// Returns true if the command recorded nothing.
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// How many times a command is attempted when its append keeps conflicting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy; at least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Serializing writers of the same aggregate id within this process
/// 2. Loading the aggregate from the event store (snapshot plus tail)
/// 3. Running the decide function to produce events
/// 4. Appending them with the loaded version as the expected version
/// 5. Reloading and retrying on a version conflict, up to the retry policy
///
/// `E` is the error type handed back to callers. It defaults to
/// [`DomainError`]; components with their own error type can pick it as long
/// as domain errors and the aggregate's decide errors convert into it.
pub struct CommandHandler<S, A, E = DomainError>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    locks: KeyedLocks,
    retry: RetryPolicy,
    _phantom: PhantomData<fn() -> (A, E)>,
}

impl<S, A, E> Clone for CommandHandler<S, A, E>
where
    S: EventStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
            retry: self.retry,
            _phantom: PhantomData,
        }
    }
}

impl<S, A, E> CommandHandler<S, A, E>
where
    S: EventStore,
    A: Aggregate + DeserializeOwned,
    E: From<DomainError> + From<A::Error>,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: KeyedLocks::default(),
            retry: RetryPolicy::default(),
            _phantom: PhantomData,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, E> {
        Ok(self.fold_stream(aggregate_id).await?)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, E> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command against an existing aggregate.
    ///
    /// `decide` receives the current state and returns the events to record.
    /// It may run more than once: after a version conflict the aggregate is
    /// reloaded and `decide` is asked again against the fresh state.
    #[tracing::instrument(skip(self, decide), fields(aggregate_type = A::aggregate_type()))]
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, E>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let _guard = self.locks.lock(aggregate_id).await;

        let mut attempt = 1;
        loop {
            let aggregate = self.fold_stream(aggregate_id).await?;
            if aggregate.id().is_none() {
                return Err(DomainError::AggregateNotFound {
                    aggregate_type: A::aggregate_type(),
                    aggregate_id,
                }
                .into());
            }

            let expected = aggregate.version();
            let events = decide(&aggregate)?;
            match self
                .commit(
                    aggregate_id,
                    aggregate,
                    events,
                    AppendOptions::expect_version(expected),
                )
                .await
            {
                Err(DomainError::EventStore(e)) if e.is_conflict() => {
                    if attempt >= self.retry.max_attempts() {
                        tracing::warn!(%aggregate_id, attempts = attempt, "giving up after repeated conflicts");
                        return Err(DomainError::ConcurrencyRetriesExhausted {
                            aggregate_id,
                            attempts: attempt,
                        }
                        .into());
                    }
                    metrics::counter!(
                        "command_conflict_retries_total",
                        "aggregate_type" => A::aggregate_type()
                    )
                    .increment(1);
                    tracing::debug!(%aggregate_id, attempt, "version conflict, reloading");
                    attempt += 1;
                }
                other => return other.map_err(E::from),
            }
        }
    }

    /// Creates a new aggregate stream.
    ///
    /// `decide` runs against the initial state and the append only succeeds if
    /// the stream is still empty. Losing that race yields
    /// [`DomainError::AlreadyExists`], so exactly one creator wins.
    #[tracing::instrument(skip(self, decide), fields(aggregate_type = A::aggregate_type()))]
    pub async fn create<F>(
        &self,
        aggregate_id: AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, E>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let _guard = self.locks.lock(aggregate_id).await;

        let aggregate = A::default();
        let events = decide(&aggregate)?;
        match self
            .commit(aggregate_id, aggregate, events, AppendOptions::expect_new())
            .await
        {
            Err(DomainError::EventStore(e)) if e.is_conflict() => Err(DomainError::AlreadyExists {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            }
            .into()),
            other => other.map_err(E::from),
        }
    }

    async fn fold_stream(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => Self::restore_from_snapshot(snapshot)?,
            None => A::default(),
        };

        // Apply events after snapshot
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    async fn commit(
        &self,
        aggregate_id: AggregateId,
        mut aggregate: A,
        events: Vec<A::Event>,
        options: AppendOptions,
    ) -> Result<CommandResult<A>, DomainError> {
        let current_version = aggregate.version();
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        let envelopes = Self::build_envelopes(aggregate_id, current_version, &events)?;
        let new_version = self.store.append(envelopes, options).await?;

        aggregate.apply_events(events.iter().cloned());
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let mut builder = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?;
            if let Some(correlation_id) = event.correlation_id() {
                builder = builder.correlation_id(correlation_id);
            }
            envelopes.push(builder.build()?);
        }

        Ok(envelopes)
    }

    fn restore_from_snapshot(snapshot: Snapshot) -> Result<A, DomainError> {
        let version = snapshot.version;
        let mut aggregate: A = snapshot.into_state()?;
        aggregate.set_version(version);
        Ok(aggregate)
    }
}

impl<S, A, E> CommandHandler<S, A, E>
where
    S: EventStore,
    A: SnapshotCapable,
    E: From<DomainError> + From<A::Error>,
{
    /// Executes a command and saves a snapshot when the new version crosses
    /// the aggregate's snapshot interval.
    ///
    /// The events are already committed when the snapshot is taken, so a
    /// failed snapshot is logged and counted but never fails the command.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, E>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let result = self.execute(aggregate_id, decide).await?;

        if !result.is_noop() && result.aggregate.should_snapshot() {
            match self.save_snapshot(aggregate_id, &result).await {
                Ok(()) => {
                    tracing::debug!(%aggregate_id, version = %result.new_version, "snapshot saved")
                }
                Err(e) => {
                    metrics::counter!(
                        "snapshot_failures_total",
                        "aggregate_type" => A::aggregate_type()
                    )
                    .increment(1);
                    tracing::warn!(%aggregate_id, version = %result.new_version, error = %e, "snapshot not saved");
                }
            }
        }

        Ok(result)
    }

    async fn save_snapshot(
        &self,
        aggregate_id: AggregateId,
        result: &CommandResult<A>,
    ) -> Result<(), DomainError> {
        let snapshot = Snapshot::from_state(
            aggregate_id,
            A::aggregate_type(),
            result.new_version,
            &result.aggregate,
        )?;
        self.store.save_snapshot(snapshot).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seats::SeatsError;
    use async_trait::async_trait;
    use event_store::{EventStoreError, InMemoryEventStore};
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Created { id: AggregateId },
        Updated { value: i32 },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Updated { .. } => "TestUpdated",
            }
        }

        fn correlation_id(&self) -> Option<String> {
            match self {
                TestEvent::Created { id } => Some(id.to_string()),
                TestEvent::Updated { .. } => None,
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct TestAggregate {
        id: Option<AggregateId>,
        value: i32,
        version: Version,
    }

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = SeatsError;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Created { id } => self.id = Some(id),
                TestEvent::Updated { value } => self.value = value,
            }
        }
    }

    impl SnapshotCapable for TestAggregate {
        fn snapshot_interval() -> usize {
            2
        }
    }

    /// Store that lets a foreign writer slip in before the next `races` appends.
    ///
    /// With `snapshots_offline` set, saving a snapshot fails.
    struct RacingStore {
        inner: InMemoryEventStore,
        races: AtomicU32,
        snapshots_offline: AtomicBool,
    }

    impl RacingStore {
        fn new(inner: InMemoryEventStore, races: u32) -> Self {
            Self {
                inner,
                races: AtomicU32::new(races),
                snapshots_offline: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl EventStore for RacingStore {
        async fn append(
            &self,
            events: Vec<EventEnvelope>,
            options: AppendOptions,
        ) -> event_store::Result<Version> {
            let pending = self.races.load(Ordering::SeqCst);
            if pending > 0 {
                self.races.store(pending - 1, Ordering::SeqCst);
                let aggregate_id = events[0].aggregate_id;
                let current = self
                    .inner
                    .get_aggregate_version(aggregate_id)
                    .await?
                    .unwrap_or_else(Version::initial);
                let foreign = EventEnvelope::builder()
                    .aggregate_id(aggregate_id)
                    .aggregate_type("TestAggregate")
                    .event_type("TestUpdated")
                    .version(current.next())
                    .payload(&TestEvent::Updated { value: 100 })?
                    .build()?;
                self.inner
                    .append(vec![foreign], AppendOptions::expect_version(current))
                    .await?;
            }
            self.inner.append(events, options).await
        }

        async fn get_events_for_aggregate(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.get_events_for_aggregate(aggregate_id).await
        }

        async fn get_events_for_aggregate_from_version(
            &self,
            aggregate_id: AggregateId,
            from_version: Version,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner
                .get_events_for_aggregate_from_version(aggregate_id, from_version)
                .await
        }

        async fn get_aggregate_version(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Option<Version>> {
            self.inner.get_aggregate_version(aggregate_id).await
        }

        async fn save_snapshot(&self, snapshot: Snapshot) -> event_store::Result<()> {
            if self.snapshots_offline.load(Ordering::SeqCst) {
                return Err(EventStoreError::Unavailable("snapshot storage offline".into()));
            }
            self.inner.save_snapshot(snapshot).await
        }

        async fn get_snapshot(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Option<Snapshot>> {
            self.inner.get_snapshot(aggregate_id).await
        }
    }

    async fn created<S: EventStore>(handler: &CommandHandler<S, TestAggregate>) -> AggregateId {
        let id = AggregateId::new();
        handler
            .create(id, |_| Ok(vec![TestEvent::Created { id }]))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn create_starts_a_stream() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let id = AggregateId::new();

        let result = handler
            .create(id, |_| Ok(vec![TestEvent::Created { id }]))
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.id(), Some(id));

        let stored = store.get_events_for_aggregate(id).await.unwrap();
        assert_eq!(stored[0].correlation_id(), Some(id.to_string().as_str()));
    }

    #[tokio::test]
    async fn second_create_reports_already_exists() {
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(InMemoryEventStore::new());
        let id = created(&handler).await;

        let result = handler
            .create(id, |_| Ok(vec![TestEvent::Created { id }]))
            .await;

        assert!(matches!(result, Err(DomainError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn execute_updates_aggregate() {
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(InMemoryEventStore::new());
        let id = created(&handler).await;

        let result = handler
            .execute(id, |_| Ok(vec![TestEvent::Updated { value: 42 }]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.value, 42);
    }

    #[tokio::test]
    async fn execute_requires_existing_stream() {
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(InMemoryEventStore::new());

        let result = handler
            .execute(AggregateId::new(), |_| Ok(vec![TestEvent::Updated { value: 1 }]))
            .await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound { .. })));
    }

    #[tokio::test]
    async fn decide_errors_are_propagated_and_nothing_is_stored() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let id = created(&handler).await;

        let result = handler
            .execute(id, |_| Err(SeatsError::InvalidQuantity { quantity: 0 }))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Seats(SeatsError::InvalidQuantity { .. }))
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn empty_decision_is_a_noop() {
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(InMemoryEventStore::new());
        let id = created(&handler).await;

        let result = handler.execute(id, |_| Ok(vec![])).await.unwrap();

        assert!(result.is_noop());
        assert_eq!(result.new_version, Version::first());
    }

    #[tokio::test]
    async fn conflict_is_retried_against_fresh_state() {
        let inner = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(RacingStore::new(inner.clone(), 0));
        let id = created(&handler).await;
        handler.store().races.store(1, Ordering::SeqCst);

        let seen = AtomicU32::new(0);
        let result = handler
            .execute(id, |agg| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(vec![TestEvent::Updated {
                    value: agg.value + 1,
                }])
            })
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(result.aggregate.value, 101);
        assert_eq!(result.new_version, Version::new(3));
        assert_eq!(inner.event_count().await, 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let inner = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(RacingStore::new(inner, 0)).with_retry_policy(RetryPolicy::new(2));
        let id = created(&handler).await;
        handler.store().races.store(5, Ordering::SeqCst);

        let result = handler
            .execute(id, |_| Ok(vec![TestEvent::Updated { value: 1 }]))
            .await;

        match result {
            Err(err @ DomainError::ConcurrencyRetriesExhausted { attempts, .. }) => {
                assert_eq!(attempts, 2);
                assert!(err.is_retryable());
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_is_used_on_load() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let id = created(&handler).await;

        handler
            .execute_with_snapshot(id, |_| Ok(vec![TestEvent::Updated { value: 7 }]))
            .await
            .unwrap();

        let snapshot = store.get_snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(2));

        handler
            .execute_with_snapshot(id, |_| Ok(vec![TestEvent::Updated { value: 8 }]))
            .await
            .unwrap();

        let loaded = handler.load(id).await.unwrap();
        assert_eq!(loaded.value, 8);
        assert_eq!(loaded.version(), Version::new(3));
    }

    #[tokio::test]
    async fn failed_snapshot_does_not_fail_the_command() {
        let inner = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(RacingStore::new(inner.clone(), 0));
        let id = created(&handler).await;
        handler.store().snapshots_offline.store(true, Ordering::SeqCst);

        let result = handler
            .execute_with_snapshot(id, |_| Ok(vec![TestEvent::Updated { value: 7 }]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(inner.event_count().await, 2);
        assert!(inner.get_snapshot(id).await.unwrap().is_none());
        assert_eq!(handler.load(id).await.unwrap().value, 7);
    }

    #[tokio::test]
    async fn load_existing_distinguishes_missing_streams() {
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(InMemoryEventStore::new());

        assert!(handler.load_existing(AggregateId::new()).await.unwrap().is_none());

        let id = created(&handler).await;
        assert!(handler.load_existing(id).await.unwrap().is_some());
    }

    #[test]
    fn retry_policy_makes_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }

    #[test]
    fn store_errors_are_not_swallowed() {
        let err: DomainError = EventStoreError::InvalidAppend("x".into()).into();
        assert!(!err.is_retryable());

        let err: DomainError = EventStoreError::Unavailable("down".into()).into();
        assert!(err.is_retryable());
    }
}
