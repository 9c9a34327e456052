//! FIFO handoff between the command source and the dispatcher.
//!
//! Writers enqueue whole scans under one lock and the reader drains
//! everything currently queued without ever waiting, so a drain never sees
//! half of a scan. The watch loop uses [`CommandQueue::replace_pending`], so
//! at most one scan is ever waiting and the queue stays bounded by the size
//! of the command tree however slowly it is drained.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::source::Command;

#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<Command>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        self.inner.lock().push_back(command);
    }

    /// Enqueue a sequence of commands atomically, preserving their order
    pub fn push_all<I>(&self, commands: I) -> usize
    where
        I: IntoIterator<Item = Command>,
    {
        let mut queue = self.inner.lock();
        let before = queue.len();
        queue.extend(commands);
        queue.len() - before
    }

    /// Discard whatever is still queued and enqueue `commands` in its place.
    ///
    /// Each scan is a full snapshot of the command tree, so a newer scan
    /// supersedes an undrained older one. Returns how many queued commands
    /// were discarded.
    pub fn replace_pending<I>(&self, commands: I) -> usize
    where
        I: IntoIterator<Item = Command>,
    {
        let mut queue = self.inner.lock();
        let discarded = queue.len();
        queue.clear();
        queue.extend(commands);
        discarded
    }

    /// Take every queued command in enqueue order. Never blocks; returns an
    /// empty vector when nothing is queued.
    pub fn drain(&self) -> Vec<Command> {
        let mut queue = self.inner.lock();
        queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
