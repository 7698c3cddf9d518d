//! Pid to descriptor index.

use super::{Pid, ProcessHandle};
use kaya_common::consts::MAXPROC;

/// Bounded map from live pids to their descriptors.
#[derive(Debug, Clone)]
pub struct PidTable {
    entries: [Option<(Pid, ProcessHandle)>; MAXPROC],
}

impl Default for PidTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PidTable {
    /// An empty table.
    pub const fn new() -> Self {
        Self {
            entries: [None; MAXPROC],
        }
    }

    /// Record `pid` in the first free entry. Returns `false` when full,
    /// which cannot happen while entries track pool slots one to one.
    pub fn insert(&mut self, pid: Pid, handle: ProcessHandle) -> bool {
        match self.entries.iter_mut().find(|e| e.is_none()) {
            Some(entry) => {
                *entry = Some((pid, handle));
                true
            }
            None => false,
        }
    }

    /// Descriptor of a live `pid`.
    pub fn lookup(&self, pid: Pid) -> Option<ProcessHandle> {
        self.entries
            .iter()
            .flatten()
            .find(|(p, _)| *p == pid)
            .map(|&(_, handle)| handle)
    }

    /// Forget `pid`.
    pub fn remove(&mut self, pid: Pid) -> Option<ProcessHandle> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| matches!(e, Some((p, _)) if *p == pid))?;
        entry.take().map(|(_, handle)| handle)
    }

    /// Number of live pids.
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// Whether no pid is recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
