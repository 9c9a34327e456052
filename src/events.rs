//! Events the pipeline reports back to its controller.
//!
//! The stream is a bounded broadcast channel. A controller that stops polling
//! never holds the pipeline back and never makes it buffer without limit:
//! once `capacity` events are waiting the oldest are dropped, and the
//! receiver skips past them on its next read.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

use crate::source::Command;

/// Sending half of the controller's event stream. Sending never blocks and
/// only fails when no receiver is left.
pub type EventSender = broadcast::Sender<RelayEvent>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RelayEvent {
    /// Snapshot of the eligible files found by the latest scan, relative to the folder root
    FilesDiscovered(Vec<PathBuf>),

    /// One command was executed and answered
    CommandExecuted(ExecutionEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionEvent {
    pub command: Command,
    pub response: String,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn new(command: Command, response: String) -> Self {
        Self {
            command,
            response,
            executed_at: Utc::now(),
        }
    }

    /// `(command, response)` pair as shown in an execution log
    pub fn as_pair(&self) -> (&str, &str) {
        (self.command.as_str(), &self.response)
    }
}

/// Receiving half of the controller's event stream
#[derive(Debug)]
pub struct EventReceiver {
    inner: broadcast::Receiver<RelayEvent>,
    dropped: u64,
}

impl EventReceiver {
    /// Next event, skipping any that were dropped while the receiver lagged.
    /// `None` once every sender is gone and the buffer is empty.
    pub async fn recv(&mut self) -> Option<RelayEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<RelayEvent> {
        loop {
            match self.inner.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Events dropped so far because this receiver fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn record_lag(&mut self, skipped: u64) {
        self.dropped += skipped;
        warn!(
            skipped,
            total_dropped = self.dropped,
            "Event receiver lagged, oldest events dropped"
        );
    }
}

/// Bounded event channel keeping at most `capacity` undelivered events
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (sender, receiver) = broadcast::channel(capacity);
    (
        sender,
        EventReceiver {
            inner: receiver,
            dropped: 0,
        },
    )
}
