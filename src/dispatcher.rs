//! # Dispatcher
//!
//! Drains the [`CommandQueue`] into a working batch and replays it against a
//! [`Console`], keeping at least `command_delay` between two consecutive
//! commands.
//!
//! ## State machine
//!
//! ```text
//!            batch empty                 nothing queued
//!   Idle ───────────────▶ Draining ───────────────▶ DrainedToIdle ──(backoff)──▶ Idle
//!    │                       │ drained something
//!    │ batch non-empty       ▼
//!    └─────────────────▶ Replaying ──(pass complete)──▶ Idle
//!
//!   any state ──(cancelled)──▶ ShuttingDown
//! ```
//!
//! When a pass completes the [`BatchPolicy`] decides what the next pass runs.
//! The console is closed exactly once when the run loop exits, whatever the
//! reason.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::cancellation::CancellationToken;
use crate::config::{ConsoleConfig, DispatchConfig};
use crate::events::{EventSender, ExecutionEvent, RelayEvent};
use crate::queue::CommandQueue;
use crate::rcon::{Console, RconConnection, RconResult};
use crate::source::Command;

/// How newly queued commands are merged into the working batch once a full
/// pass over it has completed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Append newly drained commands the batch does not already hold to its
    /// tail. Matching is by count, so a line repeated in the tree is kept as
    /// many times as it appears in a single scan.
    Append,
    /// Replace the batch wholesale when the queue holds commands; otherwise
    /// replay the same batch again
    #[default]
    Replace,
    /// Run each drained batch exactly once, then wait for the next drain
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherState {
    Idle,
    Draining,
    Replaying,
    DrainedToIdle,
    ShuttingDown,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Draining => write!(f, "draining"),
            Self::Replaying => write!(f, "replaying"),
            Self::DrainedToIdle => write!(f, "drained_to_idle"),
            Self::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

/// Counters reported when the run loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub commands_executed: u64,
    pub passes_completed: u64,
}

enum PassOutcome {
    Completed,
    Cancelled,
}

pub struct Dispatcher {
    command_delay: Duration,
    idle_backoff: Duration,
    policy: BatchPolicy,
    queue: CommandQueue,
    cancel: CancellationToken,
    events: Option<EventSender>,
    batch: Vec<Command>,
    state: DispatcherState,
    last_dispatch: Option<Instant>,
    summary: DispatchSummary,
}

impl Dispatcher {
    pub fn new(config: &DispatchConfig, queue: CommandQueue, cancel: CancellationToken) -> Self {
        Self {
            command_delay: config.command_delay(),
            idle_backoff: config.idle_backoff(),
            policy: config.batch_policy,
            queue,
            cancel,
            events: None,
            batch: Vec::new(),
            state: DispatcherState::Idle,
            last_dispatch: None,
            summary: DispatchSummary::default(),
        }
    }

    /// Report every execution on `events`
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Connect and authenticate, then run. A failed handshake is returned as
    /// is and nothing is executed.
    pub async fn connect_and_run(self, console: &ConsoleConfig) -> RconResult<DispatchSummary> {
        let connection = RconConnection::connect(console).await?;
        self.run(connection).await
    }

    /// Drive the state machine until cancellation or a console failure, then
    /// close the console.
    pub async fn run<C: Console>(mut self, mut console: C) -> RconResult<DispatchSummary> {
        info!(
            command_delay_ms = self.command_delay.as_millis() as u64,
            policy = ?self.policy,
            "Dispatcher started"
        );

        let outcome = self.drive(&mut console).await;
        let closed = console.close().await;

        match (outcome, closed) {
            (Ok(summary), Ok(())) => {
                info!(
                    commands_executed = summary.commands_executed,
                    passes_completed = summary.passes_completed,
                    "Dispatcher stopped"
                );
                Ok(summary)
            }
            (Ok(summary), Err(e)) => {
                warn!(error = %e, "Console close reported an error after a clean shutdown");
                Ok(summary)
            }
            (Err(e), close_result) => {
                if let Err(close_error) = close_result {
                    debug!(error = %close_error, "Console close failed after dispatch error");
                }
                warn!(
                    error = %e,
                    commands_executed = self.summary.commands_executed,
                    "Dispatcher stopped on console error"
                );
                Err(e)
            }
        }
    }

    async fn drive<C: Console>(&mut self, console: &mut C) -> RconResult<DispatchSummary> {
        loop {
            if self.cancel.is_cancelled() {
                self.transition(DispatcherState::ShuttingDown);
            }

            match self.state {
                DispatcherState::Idle => {
                    if self.batch.is_empty() {
                        self.transition(DispatcherState::Draining);
                    } else {
                        self.merge_queued();
                        self.transition(DispatcherState::Replaying);
                    }
                }
                DispatcherState::Draining => {
                    let drained = self.queue.drain();
                    if drained.is_empty() {
                        self.transition(DispatcherState::DrainedToIdle);
                    } else {
                        debug!(commands = drained.len(), "Drained new working batch");
                        self.batch = drained;
                        self.transition(DispatcherState::Replaying);
                    }
                }
                DispatcherState::DrainedToIdle => {
                    if self.cancel.sleep(self.idle_backoff).await {
                        self.transition(DispatcherState::ShuttingDown);
                    } else {
                        self.transition(DispatcherState::Idle);
                    }
                }
                DispatcherState::Replaying => match self.replay(console).await? {
                    PassOutcome::Completed => {
                        self.summary.passes_completed += 1;
                        if self.policy == BatchPolicy::Once {
                            self.batch.clear();
                        }
                        self.transition(DispatcherState::Idle);
                    }
                    PassOutcome::Cancelled => self.transition(DispatcherState::ShuttingDown),
                },
                DispatcherState::ShuttingDown => return Ok(self.summary),
            }
        }
    }

    /// One pass over the working batch, honouring the minimum delay
    async fn replay<C: Console>(&mut self, console: &mut C) -> RconResult<PassOutcome> {
        for index in 0..self.batch.len() {
            if self.cancel.is_cancelled() {
                return Ok(PassOutcome::Cancelled);
            }

            if let Some(last) = self.last_dispatch {
                let elapsed = last.elapsed();
                if elapsed < self.command_delay
                    && self.cancel.sleep(self.command_delay - elapsed).await
                {
                    return Ok(PassOutcome::Cancelled);
                }
            }

            let command = self.batch[index].clone();
            self.last_dispatch = Some(Instant::now());
            let response = console.execute(command.as_str()).await?;
            self.summary.commands_executed += 1;

            debug!(command = %command, response = %response, "Executed command");

            if let Some(events) = &self.events {
                // A controller that stopped listening does not stop dispatch
                let _ = events.send(RelayEvent::CommandExecuted(ExecutionEvent::new(
                    command, response,
                )));
            }
        }

        Ok(PassOutcome::Completed)
    }

    /// Apply the batch policy to whatever was queued during the last pass
    fn merge_queued(&mut self) {
        match self.policy {
            BatchPolicy::Append => {
                let drained = self.queue.drain();
                if !drained.is_empty() {
                    let appended = append_missing(&mut self.batch, drained);
                    if appended > 0 {
                        debug!(commands = appended, "Appending to working batch");
                    }
                }
            }
            BatchPolicy::Replace => {
                let drained = self.queue.drain();
                if !drained.is_empty() {
                    debug!(commands = drained.len(), "Replacing working batch");
                    self.batch = drained;
                }
            }
            BatchPolicy::Once => {}
        }
    }

    fn transition(&mut self, next: DispatcherState) {
        if self.state != next {
            trace!(from = %self.state, to = %next, "Dispatcher state transition");
            self.state = next;
        }
    }
}

/// Append the commands of `incoming` that `batch` does not already contain,
/// counting duplicates. Returns how many were appended.
fn append_missing(batch: &mut Vec<Command>, incoming: Vec<Command>) -> usize {
    let mut present: HashMap<&str, usize> = HashMap::new();
    for command in batch.iter() {
        *present.entry(command.as_str()).or_default() += 1;
    }

    let missing: Vec<Command> = incoming
        .into_iter()
        .filter(|command| match present.get_mut(command.as_str()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .collect();
    drop(present);

    let appended = missing.len();
    batch.extend(missing);
    appended
}
