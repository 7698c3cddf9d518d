//! Nucleus services, requested from kernel mode with `a0` in 1..=12.
//!
//! Arguments arrive in `a1`..`a3`; results go back in `v0` of the caller's
//! saved state. A request the nucleus does not know is treated like a
//! breakpoint: passed up to the caller's handler or fatal for the caller.

use crate::process::{BlockReason, Delegation, FaultClass, Pid, ProcessHandle};
use crate::sync::{DeviceClass, DeviceKey, SemKey};
use crate::Kernel;
use kaya_common::consts::{
    CREATEPROCESS, GETCPUTIME, GETPID, GETPPID, PASSEREN, SPECPGMVECT, SPECSYSVECT, SPECTLBVECT,
    TERMINATEPROCESS, VERHOGEN, WAITCLOCK, WAITIO,
};
use kaya_common::{KernelPanic, KernelResult, ProcessorState};
use kaya_hal::Platform;

const FAILURE: u32 = -1i32 as u32;

impl<P: Platform> Kernel<P> {
    pub(super) fn syscall(
        &mut self,
        caller: ProcessHandle,
        request: u32,
        trap: &ProcessorState,
    ) -> KernelResult<()> {
        let (a1, a2, a3) = (trap.a1(), trap.a2(), trap.a3());
        match request {
            CREATEPROCESS => {
                let result = self.create_process(caller, a1);
                self.set_result(caller, result);
            }
            TERMINATEPROCESS => {
                let result = self.terminate_process(caller, a1);
                if self.sched.current == Some(caller) {
                    self.set_result(caller, result);
                }
            }
            VERHOGEN => self.verhogen(SemKey::User(a1)),
            PASSEREN => self.passeren(SemKey::User(a1))?,
            GETPID => {
                let pid = self.procs.get(caller).pid;
                self.set_result(caller, pid.as_raw());
            }
            GETCPUTIME => {
                self.charge_current();
                let used = self.procs.get(caller).cpu_time;
                self.set_result(caller, used);
            }
            WAITCLOCK => self.wait_clock()?,
            WAITIO => self.wait_io(caller, a1, a2, a3)?,
            GETPPID => {
                let parent = self.procs.get(caller).parent;
                let result = parent.map_or(FAILURE, |p| self.procs.get(p).pid.as_raw());
                self.set_result(caller, result);
            }
            SPECTLBVECT => self.delegate(caller, FaultClass::Tlb, a1, a2),
            SPECPGMVECT => self.delegate(caller, FaultClass::ProgramTrap, a1, a2),
            SPECSYSVECT => self.delegate(caller, FaultClass::SysBreak, a1, a2),
            _ => self.pass_up_or_die(caller, FaultClass::SysBreak, trap),
        }
        Ok(())
    }

    fn set_result(&mut self, caller: ProcessHandle, value: u32) {
        self.procs.get_mut(caller).state.set_v0(value);
    }

    fn create_process(&mut self, caller: ProcessHandle, state_addr: u32) -> u32 {
        let state = self.platform.read_state(state_addr);
        match self.spawn(state, Some(caller)) {
            Some(child) => self.procs.get(child).pid.as_raw(),
            None => {
                log::warn!("process pool exhausted");
                FAILURE
            }
        }
    }

    fn terminate_process(&mut self, caller: ProcessHandle, raw: u32) -> u32 {
        let target = if raw == FAILURE {
            self.procs.get(caller).pid
        } else {
            Pid::new(raw)
        };
        if self.terminate(target) {
            0
        } else {
            FAILURE
        }
    }

    fn verhogen(&mut self, key: SemKey) {
        self.sems.adjust(&mut self.platform, key, 1);
        self.wake(key);
    }

    fn passeren(&mut self, key: SemKey) -> KernelResult<()> {
        if self.sems.adjust(&mut self.platform, key, -1) < 0 {
            self.block_current(key, BlockReason::Semaphore)?;
        }
        Ok(())
    }

    fn wait_clock(&mut self) -> KernelResult<()> {
        if self.sems.adjust(&mut self.platform, SemKey::PseudoClock, -1) < 0 {
            self.block_current(SemKey::PseudoClock, BlockReason::PseudoClock)?;
        }
        Ok(())
    }

    /// Wait for a completion on (`line`, `device`); `read` selects the
    /// receiver of a terminal.
    fn wait_io(
        &mut self,
        caller: ProcessHandle,
        line: u32,
        device: u32,
        read: u32,
    ) -> KernelResult<()> {
        let dev = DeviceClass::for_line(line, read != 0)
            .and_then(|class| DeviceKey::new(class, device))
            .ok_or(KernelPanic::InvalidDevice { line, device })?;
        let key = SemKey::Device(dev);
        if self.sems.adjust(&mut self.platform, key, -1) < 0 {
            self.block_current(key, BlockReason::Device)?;
        } else {
            let status = self.sems.status_word(dev);
            self.set_result(caller, status);
        }
        Ok(())
    }

    fn delegate(&mut self, caller: ProcessHandle, class: FaultClass, old_area: u32, new_area: u32) {
        let pcb = self.procs.get_mut(caller);
        let requests = &mut pcb.delegation_requests[class.index()];
        *requests += 1;
        if *requests > 1 {
            let pid = pcb.pid;
            log::debug!("{:?}: second {:?} registration", pid, class);
            self.terminate(pid);
        } else {
            pcb.delegations[class.index()] = Some(Delegation { old_area, new_area });
        }
    }
}
