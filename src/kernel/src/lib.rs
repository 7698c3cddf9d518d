//! Kaya nucleus
//!
//! A single-processor teaching kernel for uMPS-style machines: process
//! lifetime, counting semaphores, preemptive round-robin scheduling and
//! dispatch of traps and device interrupts.
//!
//! # Architecture
//!
//! The nucleus is structured into the following modules:
//! - `process`: descriptor pool, FIFO queues, pid table
//! - `sync`: semaphore keys, the active semaphore list, semaphore values
//! - `sched`: scheduler state and process selection
//! - `trap`: exception, syscall and interrupt dispatch
//! - `boot`: bootstrap and the driver loop
//!
//! All state lives in one [`Kernel`] value. Trap handlers run with
//! interrupts masked and never nest, so it is mutated through `&mut self`
//! without locking.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod boot;
pub mod config;
pub mod logger;
pub mod process;
pub mod sched;
pub mod sync;
pub mod testutil;
pub mod trap;

use alloc::vec::Vec;
use config::Config;
use kaya_hal::Platform;
use process::{Pcb, Pid, PidTable, ProcQueue, ProcessPool};
use sched::Scheduler;
use sync::{DeviceKey, SemKey, SemaphoreDirectory, SemaphoreRegistry};

pub use sched::Dispatch;

/// The nucleus and the platform it drives.
pub struct Kernel<P: Platform> {
    pub(crate) platform: P,
    pub(crate) procs: ProcessPool,
    pub(crate) ready: ProcQueue,
    pub(crate) pids: PidTable,
    pub(crate) asl: SemaphoreDirectory,
    pub(crate) sems: SemaphoreRegistry,
    pub(crate) sched: Scheduler,
    pub(crate) config: Config,
}

impl<P: Platform> Kernel<P> {
    /// Empty nucleus: no processes, every semaphore at zero.
    ///
    /// [`boot::init`] builds on this; it does not touch the platform.
    pub fn new(platform: P, config: Config) -> Self {
        Self {
            platform,
            procs: ProcessPool::new(),
            ready: ProcQueue::new(),
            pids: PidTable::new(),
            asl: SemaphoreDirectory::new(),
            sems: SemaphoreRegistry::new(),
            sched: Scheduler::new(),
            config,
        }
    }

    /// The platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The platform, mutably.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live processes.
    pub fn process_count(&self) -> u32 {
        self.sched.process_count
    }

    /// Number of processes waiting on a device or the pseudo-clock.
    pub fn soft_block_count(&self) -> u32 {
        self.sched.soft_block_count
    }

    /// Pid of the running process.
    pub fn current(&self) -> Option<Pid> {
        self.sched.current.map(|h| self.procs.get(h).pid)
    }

    /// Descriptor of a live process.
    pub fn pcb(&self, pid: Pid) -> Option<&Pcb> {
        self.pids.lookup(pid).map(|h| self.procs.get(h))
    }

    /// Parent of a live process.
    pub fn parent(&self, pid: Pid) -> Option<Pid> {
        let pcb = self.pcb(pid)?;
        pcb.parent.map(|h| self.procs.get(h).pid)
    }

    /// Children of a live process, oldest first.
    pub fn children(&self, pid: Pid) -> Vec<Pid> {
        self.pids
            .lookup(pid)
            .map(|h| {
                self.procs
                    .children(h)
                    .iter()
                    .map(|&c| self.procs.get(c).pid)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ready processes, head first.
    pub fn ready_pids(&self) -> Vec<Pid> {
        self.ready.iter().map(|h| self.procs.get(h).pid).collect()
    }

    /// Number of processes blocked on `key`.
    pub fn waiters(&self, key: SemKey) -> usize {
        self.asl.waiters(key)
    }

    /// Keys with at least one blocked process, in order.
    pub fn active_semaphores(&self) -> Vec<SemKey> {
        self.asl.active_keys().collect()
    }

    /// Current value of the semaphore `key`.
    pub fn semaphore(&self, key: SemKey) -> i32 {
        self.sems.value(&self.platform, key)
    }

    /// Status latched for `dev` while nobody waited.
    pub fn status_word(&self, dev: DeviceKey) -> u32 {
        self.sems.status_word(dev)
    }
}
