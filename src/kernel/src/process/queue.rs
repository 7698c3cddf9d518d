//! FIFO queues of process handles.
//!
//! The same queue backs the ready queue and every semaphore wait queue, so
//! the fairness of both comes from here: insertion at the tail, removal from
//! the head.

use super::ProcessHandle;
use alloc::collections::VecDeque;
use kaya_common::consts::MAXPROC;

/// A FIFO queue of processes.
#[derive(Debug, Clone)]
pub struct ProcQueue {
    entries: VecDeque<ProcessHandle>,
}

impl Default for ProcQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAXPROC),
        }
    }

    /// Append `handle` at the tail.
    pub fn enqueue(&mut self, handle: ProcessHandle) {
        debug_assert!(!self.contains(handle), "process queued twice");
        self.entries.push_back(handle);
    }

    /// Remove and return the head.
    pub fn dequeue(&mut self) -> Option<ProcessHandle> {
        self.entries.pop_front()
    }

    /// Remove `handle` wherever it is in the queue.
    pub fn remove(&mut self, handle: ProcessHandle) -> Option<ProcessHandle> {
        let pos = self.entries.iter().position(|&h| h == handle)?;
        self.entries.remove(pos)
    }

    /// The head, without removing it.
    pub fn peek(&self) -> Option<ProcessHandle> {
        self.entries.front().copied()
    }

    /// Whether `handle` is queued.
    pub fn contains(&self, handle: ProcessHandle) -> bool {
        self.entries.contains(&handle)
    }

    /// Number of queued processes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = ProcessHandle> + '_ {
        self.entries.iter().copied()
    }
}
