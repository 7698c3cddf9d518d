//! Shared helpers for the integration tests.

#![allow(dead_code)]

use kaya_common::consts::CREATEPROCESS;
use kaya_common::{KernelPanic, ProcessorState, Status};
use kaya_hal::Bus;
use kaya_kernel::boot;
use kaya_kernel::config::Config;
use kaya_kernel::process::Pid;
use kaya_kernel::testutil::{Event, SimMachine};
use kaya_kernel::{Dispatch, Kernel};

pub const ROOT_ENTRY: u32 = 0x2000_1000;
pub const CHILD_ENTRY: u32 = 0x2000_3000;
pub const STATE_BUF: u32 = 0x2000_8000;

/// Booted nucleus with the root process running.
pub fn booted() -> Kernel<SimMachine> {
    let mut k = boot::init(SimMachine::new(), Config::new(ROOT_ENTRY)).unwrap();
    assert_eq!(
        k.schedule().map(|d| matches!(d, Dispatch::Resume { .. })),
        Ok(true)
    );
    k
}

/// Value returned in `v0` to the process that runs next.
pub fn v0(dispatch: Result<Dispatch, KernelPanic>) -> u32 {
    match dispatch {
        Ok(Dispatch::Resume { state, .. }) => state.v0(),
        other => panic!("expected a resume, got {:?}", other),
    }
}

/// Pid of the process that runs next.
pub fn resumed_pid(dispatch: Result<Dispatch, KernelPanic>) -> Pid {
    match dispatch {
        Ok(Dispatch::Resume { pid, .. }) => pid,
        other => panic!("expected a resume, got {:?}", other),
    }
}

/// Have the running process create a kernel-mode child; returns `v0`.
pub fn create(k: &mut Kernel<SimMachine>) -> u32 {
    let mut state = ProcessorState::default();
    state.set_status_flags(Status::IEP | Status::INT_UNMASKED);
    state.set_entry(CHILD_ENTRY);
    k.platform_mut().write_state(STATE_BUF, &state);
    v0(k.inject(Event::sys(CREATEPROCESS, STATE_BUF, 0, 0)))
}

/// Expire quanta until `pid` is running.
pub fn run_until(k: &mut Kernel<SimMachine>, pid: u32) {
    for _ in 0..kaya_common::consts::MAXPROC * 2 {
        if k.current() == Some(Pid::new(pid)) {
            return;
        }
        k.inject(Event::Timer).unwrap();
    }
    panic!("pid {} never got the processor", pid);
}
