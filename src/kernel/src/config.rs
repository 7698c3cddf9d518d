//! Board-tunable nucleus parameters.

use kaya_common::consts::{SCHED_PSEUDO_CLOCK, SCHED_TIME_SLICE};

/// Values a board may override at boot.
///
/// Times are in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Quantum granted to a process before preemption.
    pub time_slice: u32,
    /// Pseudo-clock tick length.
    pub pseudo_clock: u32,
    /// Entry point of the root process.
    pub root_entry: u32,
}

impl Config {
    /// Default timings, root process starting at `root_entry`.
    pub const fn new(root_entry: u32) -> Self {
        Self {
            time_slice: SCHED_TIME_SLICE,
            pseudo_clock: SCHED_PSEUDO_CLOCK,
            root_entry,
        }
    }

    /// Override the quantum.
    pub const fn with_time_slice(mut self, time_slice: u32) -> Self {
        self.time_slice = time_slice;
        self
    }

    /// Override the pseudo-clock tick length.
    pub const fn with_pseudo_clock(mut self, pseudo_clock: u32) -> Self {
        self.pseudo_clock = pseudo_clock;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(0)
    }
}
