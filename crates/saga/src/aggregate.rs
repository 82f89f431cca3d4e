//! Order process state aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, ConferenceId, OrderId};
use domain::Aggregate;
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SagaError;
use crate::events::{ExpiryScheduledData, ProcessEvent, ProcessStartedData};
use crate::scheduler::ScheduleToken;
use crate::state::{Inbound, ProcessState, Transition};

/// Namespace for deriving process stream ids from order ids.
const PROCESS_STREAM_NAMESPACE: Uuid = Uuid::from_u128(0x6f72_6465_722d_7072_6f63_6573_732d_7631);

/// The process manager's record of one order's workflow.
///
/// Correlated by the order id (which is also the seat reservation id). The
/// process is stored on its own stream, see [`OrderProcessState::stream_id`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderProcessState {
    id: Option<OrderId>,

    #[serde(default)]
    version: Version,

    conference_id: Option<ConferenceId>,

    number_of_tickets: u32,

    state: Option<ProcessState>,

    /// Payment timeout handed to the scheduler.
    expiry: Option<ScheduleToken>,
}

impl Aggregate for OrderProcessState {
    type Event = ProcessEvent;
    type Error = SagaError;

    fn aggregate_type() -> &'static str {
        "OrderProcess"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(Self::stream_id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ProcessEvent::ProcessStarted(data) => {
                self.id = Some(data.order_id);
                self.conference_id = Some(data.conference_id);
                self.number_of_tickets = data.number_of_tickets;
                self.state = Some(ProcessState::AwaitingReservationConfirmation);
            }
            ProcessEvent::ExpiryScheduled(data) => {
                self.expiry = Some(data.token);
            }
            ProcessEvent::PaymentAwaited(_) => {
                self.state = Some(ProcessState::AwaitingPayment);
            }
            ProcessEvent::ProcessRejected(_) => {
                self.state = Some(ProcessState::Rejected);
            }
            ProcessEvent::ProcessCompleted(_) => {
                self.state = Some(ProcessState::Completed);
            }
            ProcessEvent::ProcessExpired(_) => {
                self.state = Some(ProcessState::Expired);
            }
        }
    }
}

// Query methods
impl OrderProcessState {
    /// Stream id of the process correlated with `order_id`.
    ///
    /// Derived deterministically so it never collides with the order stream.
    pub fn stream_id(order_id: OrderId) -> AggregateId {
        AggregateId::from_uuid(Uuid::new_v5(
            &PROCESS_STREAM_NAMESPACE,
            order_id.as_uuid().as_bytes(),
        ))
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn conference_id(&self) -> Option<ConferenceId> {
        self.conference_id
    }

    pub fn number_of_tickets(&self) -> u32 {
        self.number_of_tickets
    }

    /// Returns the current state, or None before the process started.
    pub fn state(&self) -> Option<ProcessState> {
        self.state
    }

    /// Returns the token of the payment timeout scheduled for this process.
    pub fn expiry_token(&self) -> Option<ScheduleToken> {
        self.expiry
    }

    /// Classifies an inbound event against the current state.
    ///
    /// A process that never started is treated like one that has not reached
    /// the predecessor yet.
    pub fn classify(&self, transition: Transition) -> Inbound {
        match self.state {
            Some(current) => transition.classify(current),
            None => Inbound::Premature,
        }
    }
}

// Command methods (return events)
impl OrderProcessState {
    /// Starts the process for a newly placed order.
    ///
    /// Starting an already started process records nothing.
    pub fn start(
        &self,
        order_id: OrderId,
        conference_id: ConferenceId,
        number_of_tickets: u32,
    ) -> Result<Vec<ProcessEvent>, SagaError> {
        if self.id.is_some() {
            return Ok(vec![]);
        }

        Ok(vec![ProcessEvent::ProcessStarted(ProcessStartedData {
            order_id,
            conference_id,
            number_of_tickets,
            started_at: Utc::now(),
        })])
    }

    /// Remembers the scheduled payment timeout so it can be cancelled later.
    pub fn record_expiry(
        &self,
        token: ScheduleToken,
        fire_at: DateTime<Utc>,
    ) -> Result<Vec<ProcessEvent>, SagaError> {
        let order_id = self.id.ok_or(SagaError::InvalidOperation {
            from: None,
            action: "schedule expiry",
        })?;

        if self.state.is_some_and(|s| s.is_terminal()) {
            return Ok(vec![]);
        }

        Ok(vec![ProcessEvent::ExpiryScheduled(ExpiryScheduledData {
            order_id,
            token,
            fire_at,
        })])
    }

    /// Moves the process along `transition`.
    ///
    /// Redelivered and premature events record nothing; events that contradict
    /// the recorded workflow are an `InvalidOperation`.
    pub fn advance(&self, transition: Transition) -> Result<Vec<ProcessEvent>, SagaError> {
        match (self.classify(transition), self.id) {
            (Inbound::Apply, Some(order_id)) => {
                Ok(ProcessEvent::entering(transition.to(), order_id)
                    .into_iter()
                    .collect())
            }
            (Inbound::Illegal, _) => Err(SagaError::InvalidOperation {
                from: self.state,
                action: transition.as_str(),
            }),
            _ => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::DomainEvent;

    fn started() -> (OrderProcessState, OrderId) {
        let order_id = OrderId::new();
        let events = OrderProcessState::default()
            .start(order_id, ConferenceId::new(), 2)
            .unwrap();
        (OrderProcessState::from_history(events), order_id)
    }

    fn advanced(mut process: OrderProcessState, transition: Transition) -> OrderProcessState {
        let events = process.advance(transition).unwrap();
        assert_eq!(events.len(), 1);
        process.apply_events(events);
        process
    }

    #[test]
    fn test_start() {
        let (process, order_id) = started();

        assert_eq!(process.order_id(), Some(order_id));
        assert_eq!(process.number_of_tickets(), 2);
        assert_eq!(
            process.state(),
            Some(ProcessState::AwaitingReservationConfirmation)
        );
        assert!(process.start(order_id, ConferenceId::new(), 2).unwrap().is_empty());
    }

    #[test]
    fn test_happy_path() {
        let (process, _) = started();

        let process = advanced(process, Transition::AcceptReservation);
        assert_eq!(process.state(), Some(ProcessState::AwaitingPayment));

        let process = advanced(process, Transition::ReceivePayment);
        assert_eq!(process.state(), Some(ProcessState::Completed));
    }

    #[test]
    fn test_expiry_token_is_recorded() {
        let (mut process, _) = started();
        let token = ScheduleToken::new();

        let events = process.record_expiry(token, Utc::now()).unwrap();
        assert_eq!(events[0].event_type(), "ExpiryScheduled");
        process.apply_events(events);
        assert_eq!(process.expiry_token(), Some(token));

        let process = advanced(process, Transition::AcceptReservation);
        assert_eq!(process.expiry_token(), Some(token));

        let process = advanced(process, Transition::Expire);
        assert_eq!(process.state(), Some(ProcessState::Expired));
        assert!(process.record_expiry(ScheduleToken::new(), Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_stream_id_is_stable_and_distinct_from_order() {
        let (process, order_id) = started();

        assert_eq!(process.id(), Some(OrderProcessState::stream_id(order_id)));
        assert_eq!(
            OrderProcessState::stream_id(order_id),
            OrderProcessState::stream_id(order_id)
        );
        assert_ne!(OrderProcessState::stream_id(order_id), AggregateId::from(order_id));
    }

    #[test]
    fn test_redelivery_is_a_noop() {
        let (process, _) = started();
        let process = advanced(process, Transition::AcceptReservation);

        assert!(process.advance(Transition::AcceptReservation).unwrap().is_empty());

        let process = advanced(process, Transition::ReceivePayment);
        assert!(process.advance(Transition::Expire).unwrap().is_empty());
        assert!(process.advance(Transition::ReceivePayment).unwrap().is_empty());
    }

    #[test]
    fn test_premature_event_is_ignored() {
        let (process, _) = started();
        assert_eq!(process.classify(Transition::ReceivePayment), Inbound::Premature);
        assert!(process.advance(Transition::ReceivePayment).unwrap().is_empty());
    }

    #[test]
    fn test_contradicting_event_is_invalid() {
        let (process, _) = started();
        let process = advanced(process, Transition::AcceptReservation);

        let result = process.advance(Transition::RejectReservation);
        assert!(matches!(
            result,
            Err(SagaError::InvalidOperation {
                from: Some(ProcessState::AwaitingPayment),
                action: "reject reservation",
            })
        ));
    }

    #[test]
    fn test_unstarted_process() {
        let process = OrderProcessState::default();
        assert!(process.state().is_none());
        assert!(process.advance(Transition::Expire).unwrap().is_empty());
        assert!(process.record_expiry(ScheduleToken::new(), Utc::now()).is_err());
    }

    #[test]
    fn test_serialization() {
        let (process, order_id) = started();
        let process = advanced(process, Transition::AcceptReservation);

        let json = serde_json::to_string(&process).unwrap();
        let restored: OrderProcessState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.order_id(), Some(order_id));
        assert_eq!(restored.state(), Some(ProcessState::AwaitingPayment));
    }
}
