//! Order process events.

use chrono::{DateTime, Utc};
use common::{ConferenceId, OrderId};
use domain::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::scheduler::ScheduleToken;
use crate::state::ProcessState;

/// Events recorded on an order's process stream.
///
/// The stream doubles as the audit trail of the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProcessEvent {
    /// An order was placed and its seats requested.
    ProcessStarted(ProcessStartedData),

    /// The payment timeout was handed to the scheduler.
    ExpiryScheduled(ExpiryScheduledData),

    /// Seats were reserved; waiting for payment.
    PaymentAwaited(ProcessTransitionData),

    /// Seats could not be reserved.
    ProcessRejected(ProcessTransitionData),

    /// Payment arrived.
    ProcessCompleted(ProcessTransitionData),

    /// The payment window elapsed.
    ProcessExpired(ProcessTransitionData),
}

impl DomainEvent for ProcessEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProcessEvent::ProcessStarted(_) => "ProcessStarted",
            ProcessEvent::ExpiryScheduled(_) => "ExpiryScheduled",
            ProcessEvent::PaymentAwaited(_) => "PaymentAwaited",
            ProcessEvent::ProcessRejected(_) => "ProcessRejected",
            ProcessEvent::ProcessCompleted(_) => "ProcessCompleted",
            ProcessEvent::ProcessExpired(_) => "ProcessExpired",
        }
    }

    fn correlation_id(&self) -> Option<String> {
        Some(self.order_id().to_string())
    }
}

impl ProcessEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            ProcessEvent::ProcessStarted(data) => data.order_id,
            ProcessEvent::ExpiryScheduled(data) => data.order_id,
            ProcessEvent::PaymentAwaited(data)
            | ProcessEvent::ProcessRejected(data)
            | ProcessEvent::ProcessCompleted(data)
            | ProcessEvent::ProcessExpired(data) => data.order_id,
        }
    }

    /// Builds the event that moves a process into `state`.
    ///
    /// Returns None for the initial state, which only `ProcessStarted` enters.
    pub fn entering(state: ProcessState, order_id: OrderId) -> Option<Self> {
        let data = ProcessTransitionData {
            order_id,
            occurred_at: Utc::now(),
        };
        match state {
            ProcessState::AwaitingReservationConfirmation => None,
            ProcessState::AwaitingPayment => Some(ProcessEvent::PaymentAwaited(data)),
            ProcessState::Rejected => Some(ProcessEvent::ProcessRejected(data)),
            ProcessState::Completed => Some(ProcessEvent::ProcessCompleted(data)),
            ProcessState::Expired => Some(ProcessEvent::ProcessExpired(data)),
        }
    }
}

/// Data for ProcessStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStartedData {
    pub order_id: OrderId,
    pub conference_id: ConferenceId,
    pub number_of_tickets: u32,
    pub started_at: DateTime<Utc>,
}

/// Data for ExpiryScheduled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryScheduledData {
    pub order_id: OrderId,
    pub token: ScheduleToken,

    /// Earliest time the expiry will be delivered.
    pub fire_at: DateTime<Utc>,
}

/// Data shared by the state transition events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTransitionData {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}
