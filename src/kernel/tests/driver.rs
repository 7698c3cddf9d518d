//! The boot driver loop against a scripted machine.

use kaya_common::consts::{CREATEPROCESS, GETPID, INT_DISK, TERMINATEPROCESS, WAITCLOCK, WAITIO};
use kaya_common::{KernelPanic, ProcessorState, Status};
use kaya_hal::Bus;
use kaya_kernel::boot;
use kaya_kernel::config::Config;
use kaya_kernel::testutil::{Event, SimMachine};

const ROOT_ENTRY: u32 = 0x2000_1000;
const CHILD_ENTRY: u32 = 0x2000_3000;
const STATE_BUF: u32 = 0x2000_8000;

#[test]
fn io_round_trip_until_halt() {
    let mut sim = SimMachine::new();
    let mut child = ProcessorState::default();
    child.set_status_flags(Status::IEP | Status::INT_UNMASKED);
    child.set_entry(CHILD_ENTRY);
    sim.write_state(STATE_BUF, &child);

    sim.script(Event::sys(CREATEPROCESS, STATE_BUF, 0, 0));
    sim.script(Event::sys(WAITIO, INT_DISK as u32, 1, 0));
    sim.script_after(300, Event::sys(GETPID, 0, 0, 0));
    sim.script_after(
        200,
        Event::Device {
            line: INT_DISK,
            device: 1,
            status: 0x42,
        },
    );
    sim.script(Event::sys(TERMINATEPROCESS, u32::MAX, 0, 0));

    let mut k = boot::init(sim, Config::new(ROOT_ENTRY)).unwrap();
    assert_eq!(boot::run(&mut k), Ok(()));

    let sim = k.platform();
    assert!(sim.is_halted());
    assert!(!sim.is_panicked());
    let pcs: Vec<_> = sim.resumed().iter().map(|s| s.pc).collect();
    assert_eq!(
        pcs,
        [
            ROOT_ENTRY,
            ROOT_ENTRY + 4,
            CHILD_ENTRY,
            CHILD_ENTRY + 4,
            CHILD_ENTRY + 4,
            ROOT_ENTRY + 8,
        ]
    );
    assert_eq!(sim.resumed()[3].v0(), 2);
    assert_eq!(sim.resumed()[5].v0(), 0x42);
    assert_eq!(k.process_count(), 0);
}

#[test]
fn idle_until_the_clock_ticks() {
    let mut sim = SimMachine::new();
    sim.script(Event::sys(WAITCLOCK, 0, 0, 0));

    let mut k = boot::init(sim, Config::new(ROOT_ENTRY).with_pseudo_clock(20_000)).unwrap();
    assert_eq!(boot::run(&mut k), Ok(()));
    assert_eq!(k.platform().idles(), 1);
    assert_eq!(k.platform().resumed().len(), 2);
    assert!(k.platform().is_halted());
}

#[test]
fn fatal_wait_io_panics_the_machine() {
    let mut sim = SimMachine::new();
    sim.script(Event::sys(WAITIO, 9, 0, 0));

    let mut k = boot::init(sim, Config::new(ROOT_ENTRY)).unwrap();
    assert_eq!(
        boot::run(&mut k),
        Err(KernelPanic::InvalidDevice { line: 9, device: 0 })
    );
    assert!(k.platform().is_panicked());
}
