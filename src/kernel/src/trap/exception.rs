//! Syscall/breakpoint, program trap and TLB handlers.

use crate::process::FaultClass;
use crate::{Dispatch, Kernel};
use kaya_common::consts::{SYSCALL_MAX, WORD_SIZE};
use kaya_common::state::{cause_exc_code, cause_with_exc_code};
use kaya_common::{ExceptionCode, KernelPanic, KernelResult};
use kaya_hal::{Platform, TrapVector};

impl<P: Platform> Kernel<P> {
    /// `SYSCALL` or `BREAK` executed by the current process.
    ///
    /// Nucleus services requested from user mode are refused as a reserved
    /// instruction and take the program trap path.
    pub fn on_sys_breakpoint(&mut self) -> KernelResult<Dispatch> {
        let (current, trap) = self.save_current(TrapVector::SysBreak)?;
        // Resume after the trapping instruction.
        let pcb = self.procs.get_mut(current);
        pcb.state.pc = pcb.state.pc.wrapping_add(WORD_SIZE);

        match trap.exc_code() {
            Some(ExceptionCode::Syscall) => {
                let request = trap.a0();
                if !trap.from_user_mode() {
                    self.syscall(current, request, &trap)?;
                } else if (1..=SYSCALL_MAX).contains(&request) {
                    let mut refused = trap;
                    refused.cause = cause_with_exc_code(trap.cause, ExceptionCode::ReservedInstruction);
                    self.platform
                        .write_state(TrapVector::ProgramTrap.old_area(), &refused);
                    return self.on_program_trap();
                } else {
                    self.pass_up_or_die(current, FaultClass::SysBreak, &trap);
                }
            }
            Some(ExceptionCode::Breakpoint) => {
                self.pass_up_or_die(current, FaultClass::SysBreak, &trap);
            }
            _ => return Err(KernelPanic::UnexpectedException(cause_exc_code(trap.cause))),
        }
        self.schedule()
    }

    /// Program trap raised by the current process.
    pub fn on_program_trap(&mut self) -> KernelResult<Dispatch> {
        let (current, trap) = self.save_current(TrapVector::ProgramTrap)?;
        self.pass_up_or_die(current, FaultClass::ProgramTrap, &trap);
        self.schedule()
    }

    /// Address translation fault raised by the current process.
    pub fn on_tlb(&mut self) -> KernelResult<Dispatch> {
        let (current, trap) = self.save_current(TrapVector::Tlb)?;
        self.pass_up_or_die(current, FaultClass::Tlb, &trap);
        self.schedule()
    }
}
