//! Order process state machine.

use serde::{Deserialize, Serialize};

/// Where an order's workflow currently stands.
///
/// State transitions:
/// ```text
/// AwaitingReservationConfirmation ──┬──► AwaitingPayment ──┬──► Completed
///                                   │                      └──► Expired
///                                   └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessState {
    /// Seats were requested; waiting for the inventory's answer.
    AwaitingReservationConfirmation,

    /// Seats are held; waiting for payment or the payment window to elapse.
    AwaitingPayment,

    /// No seats could be reserved (terminal state).
    Rejected,

    /// Paid and seats committed (terminal state).
    Completed,

    /// Payment window elapsed and seats were released (terminal state).
    Expired,
}

impl ProcessState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessState::Rejected | ProcessState::Completed | ProcessState::Expired
        )
    }

    /// Position along the workflow. States with a lower rank come first.
    pub fn rank(&self) -> u8 {
        match self {
            ProcessState::AwaitingReservationConfirmation => 0,
            ProcessState::AwaitingPayment => 1,
            ProcessState::Rejected | ProcessState::Completed | ProcessState::Expired => 2,
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::AwaitingReservationConfirmation => "AwaitingReservationConfirmation",
            ProcessState::AwaitingPayment => "AwaitingPayment",
            ProcessState::Rejected => "Rejected",
            ProcessState::Completed => "Completed",
            ProcessState::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The edges of the state machine that inbound events drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    AcceptReservation,
    RejectReservation,
    ReceivePayment,
    Expire,
}

impl Transition {
    pub fn from(&self) -> ProcessState {
        match self {
            Transition::AcceptReservation | Transition::RejectReservation => {
                ProcessState::AwaitingReservationConfirmation
            }
            Transition::ReceivePayment | Transition::Expire => ProcessState::AwaitingPayment,
        }
    }

    pub fn to(&self) -> ProcessState {
        match self {
            Transition::AcceptReservation => ProcessState::AwaitingPayment,
            Transition::RejectReservation => ProcessState::Rejected,
            Transition::ReceivePayment => ProcessState::Completed,
            Transition::Expire => ProcessState::Expired,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::AcceptReservation => "accept reservation",
            Transition::RejectReservation => "reject reservation",
            Transition::ReceivePayment => "receive payment",
            Transition::Expire => "expire",
        }
    }

    /// Decides what an inbound event means for a process currently in `current`.
    pub fn classify(&self, current: ProcessState) -> Inbound {
        if current == self.to() {
            Inbound::Redelivered
        } else if current.is_terminal() {
            Inbound::Stale
        } else if current == self.from() {
            Inbound::Apply
        } else if current.rank() < self.from().rank() {
            Inbound::Premature
        } else {
            Inbound::Illegal
        }
    }
}

/// How an inbound event relates to the current process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// The event moves the process forward.
    Apply,
    /// Already reflected. The state is kept but its follow-up commands are
    /// due again, since they may not have run.
    Redelivered,
    /// The process finished along another edge. Nothing to do.
    Stale,
    /// The expected predecessor state has not been reached yet.
    Premature,
    /// The event contradicts the recorded workflow.
    Illegal,
}
