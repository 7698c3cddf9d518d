//! Round-robin scheduler.
//!
//! The nucleus is either dispatching (a current process exists) or
//! selecting (none does). Every trap handler ends in [`Kernel::schedule`],
//! which charges elapsed time, arms the interval timer and says what the
//! driver loop should do next.
//!
//! # Time keeping
//!
//! Times are microseconds derived from the TOD clock. Timestamps are kept as
//! raw clock ticks and only intervals are scaled. The interval timer is
//! always armed for whichever comes first: the end of the current quantum
//! or the next pseudo-clock tick.

use crate::process::{BlockReason, Pid, ProcessHandle};
use crate::sync::SemKey;
use crate::Kernel;
use core::cmp::min;
use kaya_common::consts::{BUS_INTERVALTIMER, BUS_TIMESCALE, BUS_TODLOW};
use kaya_common::{KernelPanic, KernelResult, ProcessorState};
use kaya_hal::Platform;

/// What the driver loop does after a trap has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Load `state` and run process `pid`.
    Resume {
        /// The process being resumed.
        pid: Pid,
        /// Its saved state.
        state: ProcessorState,
    },
    /// Nothing ready: enable interrupts and wait.
    Idle,
    /// No process left: stop the machine.
    Halt,
}

/// Global scheduling state.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    /// Running process.
    pub current: Option<ProcessHandle>,
    /// Live processes.
    pub process_count: u32,
    /// Processes waiting on a device or the pseudo-clock.
    pub soft_block_count: u32,
    /// Last pid handed out.
    pub pid_count: u32,
    /// Raw TOD reading up to which the current process has been charged.
    pub process_tod: u32,
    /// Time accumulated towards the next pseudo-clock tick.
    pub timer_tick: u32,
    /// Raw TOD reading up to which `timer_tick` has been accumulated.
    pub start_timer_tick: u32,
}

impl Scheduler {
    /// Selecting, no processes, no time accumulated.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Whole microseconds between the raw clock readings `*since` and `now`.
///
/// `*since` moves forward by exactly the ticks accounted for, so a partial
/// microsecond carries into the next interval. The subtraction is done on raw
/// ticks so a TOD wrap costs nothing.
fn elapsed_micros(now: u32, since: &mut u32, scale: u32) -> u32 {
    let micros = now.wrapping_sub(*since) / scale;
    *since = since.wrapping_add(micros.wrapping_mul(scale));
    micros
}

impl<P: Platform> Kernel<P> {
    /// Raw time-of-day clock, in ticks.
    pub(crate) fn now(&self) -> u32 {
        self.platform.read_word(BUS_TODLOW)
    }

    fn timescale(&self) -> u32 {
        self.platform.read_word(BUS_TIMESCALE).max(1)
    }

    fn arm_timer(&mut self, micros: u32) {
        let ticks = micros.saturating_mul(self.timescale());
        self.platform.write_word(BUS_INTERVALTIMER, ticks);
    }

    /// Charge the time since the last charge to the current process.
    pub(crate) fn charge_current(&mut self) {
        let (now, scale) = (self.now(), self.timescale());
        let Some(current) = self.sched.current else {
            self.sched.process_tod = now;
            return;
        };
        let elapsed = elapsed_micros(now, &mut self.sched.process_tod, scale);
        let pcb = self.procs.get_mut(current);
        pcb.cpu_time = pcb.cpu_time.wrapping_add(elapsed);
        pcb.slice_time = pcb.slice_time.saturating_add(elapsed);
    }

    /// Fold the time since the last update into the tick accumulator.
    pub(crate) fn fold_tick(&mut self) {
        let (now, scale) = (self.now(), self.timescale());
        let elapsed = elapsed_micros(now, &mut self.sched.start_timer_tick, scale);
        self.sched.timer_tick = self.sched.timer_tick.saturating_add(elapsed);
    }

    fn tick_remaining(&self) -> u32 {
        self.config.pseudo_clock.saturating_sub(self.sched.timer_tick)
    }

    /// Queue the current process on `key` and give up the processor.
    pub(crate) fn block_current(&mut self, key: SemKey, reason: BlockReason) -> KernelResult<()> {
        let current = self.sched.current.ok_or(KernelPanic::NoCurrentProcess)?;
        self.asl.block(&mut self.procs, key, current)?;
        self.procs.get_mut(current).blocked = reason;
        if reason.is_soft() {
            self.sched.soft_block_count += 1;
        }
        self.sched.current = None;
        Ok(())
    }

    /// Move the oldest waiter on `key` to the ready queue.
    pub(crate) fn wake(&mut self, key: SemKey) -> Option<ProcessHandle> {
        let woken = self.asl.wake_one(&mut self.procs, key)?;
        let pcb = self.procs.get_mut(woken);
        if pcb.blocked.is_soft() {
            self.sched.soft_block_count -= 1;
        }
        pcb.blocked = BlockReason::None;
        self.ready.enqueue(woken);
        Some(woken)
    }

    /// Pick what runs next.
    ///
    /// Fails with [`KernelPanic::Deadlock`] when processes are alive but
    /// none is ready and none waits on a device or the pseudo-clock.
    pub fn schedule(&mut self) -> KernelResult<Dispatch> {
        if let Some(current) = self.sched.current {
            self.charge_current();
            self.fold_tick();
            let pcb = self.procs.get(current);
            let slice = self.config.time_slice.saturating_sub(pcb.slice_time);
            let (pid, state) = (pcb.pid, pcb.state);
            self.arm_timer(min(slice, self.tick_remaining()));
            log::trace!("resuming {:?}", pid);
            return Ok(Dispatch::Resume { pid, state });
        }

        let Some(next) = self.ready.dequeue() else {
            if self.sched.process_count == 0 {
                log::info!("no processes left");
                return Ok(Dispatch::Halt);
            }
            if self.sched.soft_block_count == 0 {
                log::error!(
                    "{} processes alive, none ready or soft-blocked",
                    self.sched.process_count
                );
                return Err(KernelPanic::Deadlock);
            }
            self.fold_tick();
            self.arm_timer(self.tick_remaining());
            log::trace!("idle, {} soft-blocked", self.sched.soft_block_count);
            return Ok(Dispatch::Idle);
        };

        self.sched.current = Some(next);
        self.sched.process_tod = self.now();
        self.fold_tick();
        let pcb = self.procs.get_mut(next);
        pcb.slice_time = 0;
        let (pid, state) = (pcb.pid, pcb.state);
        self.arm_timer(min(self.config.time_slice, self.tick_remaining()));
        log::trace!("dispatching {:?}", pid);
        Ok(Dispatch::Resume { pid, state })
    }
}
