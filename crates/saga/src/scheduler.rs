//! Delayed command delivery.
//!
//! The process manager asks for an `ExpireOrder` to come back once the payment
//! window has elapsed. Delivery is at-least-once and never early; cancellation
//! is best effort, so a cancelled command can still show up and must be
//! tolerated by whoever receives it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use domain::ExpireOrder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Handle for a scheduled command, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleToken(Uuid);

impl ScheduleToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScheduleToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScheduleToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commands that can be delivered later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledCommand {
    ExpireOrder(ExpireOrder),
}

/// Reasons a command could not be scheduled.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no async runtime available to run the timer")]
    NoRuntime,

    #[error("the delivery channel is closed")]
    Closed,

    #[error("scheduler unavailable: {0}")]
    Unavailable(String),
}

/// Delivers commands back to the application after a delay.
pub trait CommandScheduler: Send + Sync {
    /// Arranges for `command` to be delivered no earlier than `fire_after` from now.
    fn schedule(
        &self,
        command: ScheduledCommand,
        fire_after: Duration,
    ) -> Result<ScheduleToken, SchedulerError>;

    /// Cancels a scheduled command if it has not fired yet.
    fn cancel(&self, token: ScheduleToken);
}

/// Timer-per-command scheduler backed by tokio tasks.
///
/// Fired commands are sent over an unbounded channel; the receiving half goes
/// to the application's intake loop.
#[derive(Clone)]
pub struct TokioCommandScheduler {
    sender: mpsc::UnboundedSender<ScheduledCommand>,
    timers: Arc<Mutex<HashMap<ScheduleToken, AbortHandle>>>,
}

impl TokioCommandScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScheduledCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            sender,
            timers: Arc::new(Mutex::new(HashMap::new())),
        };
        (scheduler, receiver)
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl CommandScheduler for TokioCommandScheduler {
    fn schedule(
        &self,
        command: ScheduledCommand,
        fire_after: Duration,
    ) -> Result<ScheduleToken, SchedulerError> {
        if self.sender.is_closed() {
            return Err(SchedulerError::Closed);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let token = ScheduleToken::new();
        let sender = self.sender.clone();
        let timers = Arc::clone(&self.timers);

        // Held across spawn so the timer cannot deregister before it is registered
        let mut registered = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let task = runtime.spawn(async move {
            tokio::time::sleep(fire_after).await;
            timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&token);
            if sender.send(command).is_err() {
                tracing::warn!(%token, ?command, "scheduled command dropped, intake is gone");
            }
        });
        registered.insert(token, task.abort_handle());

        tracing::debug!(%token, ?command, ?fire_after, "command scheduled");
        Ok(token)
    }

    fn cancel(&self, token: ScheduleToken) {
        let timer = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token);
        if let Some(timer) = timer {
            timer.abort();
            tracing::debug!(%token, "scheduled command cancelled");
        }
    }
}

/// A command held by [`InMemoryCommandScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    pub token: ScheduleToken,
    pub command: ScheduledCommand,
    pub fire_after: Duration,
}

#[derive(Default)]
struct InMemoryState {
    pending: Vec<PendingCommand>,
    cancelled: Vec<ScheduleToken>,
    unavailable: bool,
}

/// Scheduler that only records requests; tests fire them explicitly.
#[derive(Clone, Default)]
pub struct InMemoryCommandScheduler {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryCommandScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler whose every `schedule` call fails.
    pub fn unavailable() -> Self {
        let scheduler = Self::default();
        scheduler.lock().unavailable = true;
        scheduler
    }

    /// Commands scheduled and not yet fired or cancelled.
    pub fn pending(&self) -> Vec<PendingCommand> {
        self.lock().pending.clone()
    }

    pub fn was_cancelled(&self, token: ScheduleToken) -> bool {
        self.lock().cancelled.contains(&token)
    }

    /// Removes and returns every pending command, as if all timers elapsed.
    pub fn fire_all(&self) -> Vec<ScheduledCommand> {
        self.lock()
            .pending
            .drain(..)
            .map(|pending| pending.command)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommandScheduler for InMemoryCommandScheduler {
    fn schedule(
        &self,
        command: ScheduledCommand,
        fire_after: Duration,
    ) -> Result<ScheduleToken, SchedulerError> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(SchedulerError::Unavailable("configured to fail".to_string()));
        }
        let token = ScheduleToken::new();
        state.pending.push(PendingCommand {
            token,
            command,
            fire_after,
        });
        Ok(token)
    }

    fn cancel(&self, token: ScheduleToken) {
        let mut state = self.lock();
        state.pending.retain(|pending| pending.token != token);
        state.cancelled.push(token);
    }
}
