//! Trap dispatch.
//!
//! The platform lands here after saving the interrupted state in the old
//! area of the vector that fired. Each entry point copies that state into
//! the current descriptor, acts on it and returns through the scheduler.
//!
//! - [`exception`]: syscalls, breakpoints, TLB faults and program traps
//! - [`syscall`]: the nucleus services behind request numbers 1..=12
//! - [`interrupt`]: interval timer and device completions

pub mod exception;
pub mod interrupt;
pub mod syscall;

use crate::process::{Delegation, FaultClass, ProcessHandle};
use crate::{Dispatch, Kernel};
use kaya_common::{KernelPanic, KernelResult, ProcessorState};
use kaya_hal::{Platform, TrapVector};

impl<P: Platform> Kernel<P> {
    /// Handle a trap on `vector`.
    pub fn dispatch(&mut self, vector: TrapVector) -> KernelResult<Dispatch> {
        match vector {
            TrapVector::SysBreak => self.on_sys_breakpoint(),
            TrapVector::ProgramTrap => self.on_program_trap(),
            TrapVector::Tlb => self.on_tlb(),
            TrapVector::Interrupt => self.on_interrupt(),
        }
    }

    /// Copy the old area of `vector` into the current descriptor.
    fn save_current(&mut self, vector: TrapVector) -> KernelResult<(ProcessHandle, ProcessorState)> {
        let current = self.sched.current.ok_or(KernelPanic::NoCurrentProcess)?;
        let saved = self.platform.read_state(vector.old_area());
        self.procs.get_mut(current).state = saved;
        self.charge_current();
        Ok((current, saved))
    }

    /// Hand `trap` to the handler `current` registered for `class`, or kill
    /// it if there is none.
    fn pass_up_or_die(&mut self, current: ProcessHandle, class: FaultClass, trap: &ProcessorState) {
        let pcb = self.procs.get(current);
        match pcb.delegation(class) {
            Some(Delegation { old_area, new_area }) => {
                log::debug!("{:?}: passing {:?} up", pcb.pid, class);
                self.platform.write_state(old_area, trap);
                let handler = self.platform.read_state(new_area);
                self.procs.get_mut(current).state = handler;
            }
            None => {
                let pid = pcb.pid;
                log::debug!("{:?}: unhandled {:?}, terminating", pid, class);
                self.terminate(pid);
            }
        }
    }
}
