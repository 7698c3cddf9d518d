//! Bootstrap and the driver loop.
//!
//! [`init`] prepares the trap new areas and the root process; [`run`]
//! carries out what the dispatchers decide until the machine halts.
//! Boot progress is reported as Linux-style status lines through `log`.

pub mod banner;

use crate::config::Config;
use crate::{Dispatch, Kernel};
use kaya_common::consts::{BUS_INSTALLEDRAM, BUS_RAMBASEADDR, FRAME_SIZE};
use kaya_common::{KernelPanic, KernelResult, ProcessorState, Status as Sr};
use kaya_hal::{Platform, TrapVector};

/// Boot status indicators.
#[derive(Debug, Clone, Copy)]
pub enum Status {
    /// Success - `[ OK ]`
    Ok,
    /// Failure - `[FAIL]`
    Fail,
    /// Warning - `[WARN]`
    Warn,
    /// Informational - `[INFO]`
    Info,
}

/// Log a boot stage with status.
///
/// Format: `[ OK ] Message text`
pub fn log(status: Status, message: &str) {
    match status {
        Status::Ok => log::info!(target: "boot", "[ OK ] {}", message),
        Status::Fail => log::error!(target: "boot", "[FAIL] {}", message),
        Status::Warn => log::warn!(target: "boot", "[WARN] {}", message),
        Status::Info => log::info!(target: "boot", "[INFO] {}", message),
    }
}

/// Log an indented detail line (for sub-items).
///
/// Format: `       Detail text` (aligned with message after status)
pub fn log_detail(message: &str) {
    log::info!(target: "boot", "       {}", message);
}

/// Handler state for `vector`: kernel mode, interrupts masked, VM off,
/// running the platform trampoline on the kernel stack.
fn populate<P: Platform>(platform: &mut P, vector: TrapVector, ramtop: u32) {
    let mut area = platform.store_state();
    area.set_entry(platform.trap_entry(vector));
    area.set_sp(ramtop);
    let mut status = area.status_flags();
    status.remove(Sr::IEC | Sr::KUC | Sr::INT_UNMASKED | Sr::VMC | Sr::VMP);
    area.set_status_flags(status);
    platform.write_state(vector.new_area(), &area);
}

/// Bring up the nucleus on `platform`.
///
/// Installs the four trap handlers, creates the root process (pid 1, ready,
/// not yet running) and starts the pseudo-clock.
pub fn init<P: Platform>(platform: P, config: Config) -> KernelResult<Kernel<P>> {
    banner::print_banner();
    let mut kernel = Kernel::new(platform, config);

    if config.time_slice > config.pseudo_clock {
        log(Status::Warn, "Time slice longer than the pseudo-clock interval");
    }

    let base = kernel.platform.read_word(BUS_RAMBASEADDR);
    let size = kernel.platform.read_word(BUS_INSTALLEDRAM);
    let Some(ramtop) = base.checked_add(size).filter(|_| size >= FRAME_SIZE) else {
        log(Status::Fail, "RAM geometry");
        return Err(KernelPanic::BadRamGeometry { base, size });
    };
    for vector in TrapVector::ALL {
        populate(&mut kernel.platform, vector, ramtop);
    }
    log(Status::Ok, "Trap new areas populated");
    log_detail(&alloc::format!("RAMTOP {:#010x}", ramtop));

    let mut root = ProcessorState::default();
    root.set_status_flags(Sr::IEP | Sr::INT_UNMASKED);
    root.set_sp(ramtop - FRAME_SIZE);
    root.set_entry(config.root_entry);
    if kernel.spawn(root, None).is_none() {
        log(Status::Fail, "Root process");
        return Err(KernelPanic::ProcessPoolExhausted);
    }
    log(Status::Ok, "Root process created");
    log_detail(&alloc::format!("entry {:#010x}", config.root_entry));

    kernel.sched.start_timer_tick = kernel.now();
    log(Status::Ok, "Pseudo-clock started");
    Ok(kernel)
}

/// Drive `kernel` until no process is left.
///
/// Returns the fatal condition if the nucleus gives up; the platform has
/// been told to panic by then.
pub fn run<P: Platform>(kernel: &mut Kernel<P>) -> KernelResult<()> {
    let mut next = kernel.schedule();
    loop {
        let vector = match next {
            Ok(Dispatch::Resume { state, .. }) => kernel.platform.resume(&state),
            Ok(Dispatch::Idle) => {
                kernel.platform.wait_for_interrupt();
                TrapVector::Interrupt
            }
            Ok(Dispatch::Halt) => {
                log(Status::Info, "All processes terminated, halting");
                kernel.platform.halt();
                return Ok(());
            }
            Err(panic) => {
                log(Status::Fail, &alloc::format!("Kernel panic: {}", panic));
                kernel.platform.panic();
                return Err(panic);
            }
        };
        next = kernel.dispatch(vector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Pid;
    use crate::testutil::{Event, SimMachine};
    use kaya_common::consts::{GETPID, INT_NEWAREA, SYSBK_NEWAREA, VERHOGEN};
    use kaya_hal::Bus;

    const ENTRY: u32 = 0x2000_1000;

    #[test]
    fn test_new_areas_populated() {
        let k = init(SimMachine::new(), Config::new(ENTRY)).unwrap();
        let area = k.platform().read_state(SYSBK_NEWAREA);
        assert_eq!(area.pc, SimMachine::TRAP_ENTRY);
        assert_eq!(area.gpr[kaya_common::state::REG_T9], area.pc);
        assert_eq!(area.sp(), k.platform().ramtop());
        let status = area.status_flags();
        assert!(!status.intersects(Sr::INT_UNMASKED | Sr::VMC | Sr::VMP | Sr::KUC | Sr::IEC));

        let int_area = k.platform().read_state(INT_NEWAREA);
        assert_eq!(int_area.pc, SimMachine::TRAP_ENTRY + 3 * 0x80);
    }

    #[test]
    fn test_root_process() {
        let k = init(SimMachine::new(), Config::new(ENTRY)).unwrap();
        let root = k.pcb(Pid::new(1)).unwrap();
        assert_eq!(root.state.pc, ENTRY);
        assert_eq!(root.state.sp(), k.platform().ramtop() - FRAME_SIZE);
        assert_eq!(root.state.status_flags(), Sr::IEP | Sr::INT_UNMASKED);
        assert_eq!(k.process_count(), 1);
        assert_eq!(k.ready_pids(), [Pid::new(1)]);
        assert_eq!(k.current(), None);
    }

    #[test]
    fn test_bad_ram_geometry() {
        let mut sim = SimMachine::new();
        sim.write_word(BUS_INSTALLEDRAM, u32::MAX);
        assert_eq!(
            init(sim, Config::new(ENTRY)).err(),
            Some(KernelPanic::BadRamGeometry {
                base: SimMachine::RAM_BASE,
                size: u32::MAX,
            })
        );

        let mut sim = SimMachine::new();
        sim.write_word(BUS_INSTALLEDRAM, FRAME_SIZE - 4);
        assert!(matches!(
            init(sim, Config::new(ENTRY)),
            Err(KernelPanic::BadRamGeometry { .. })
        ));
    }

    #[test]
    fn test_run_until_halt() {
        let mut k = init(SimMachine::new(), Config::new(ENTRY)).unwrap();
        k.platform_mut().script(Event::sys(GETPID, 0, 0, 0));
        k.platform_mut().script_after(100, Event::sys(VERHOGEN, 0x2000_9000, 0, 0));

        assert_eq!(run(&mut k), Ok(()));
        assert!(k.platform().is_halted());
        // Initial dispatch, then once after each syscall; the third trap is
        // the scripted exit.
        let resumed = k.platform().resumed();
        assert_eq!(resumed.len(), 3);
        assert_eq!(resumed[1].v0(), 1);
        assert_eq!(k.platform().read_word(0x2000_9000), 1);
    }

    #[test]
    fn test_run_reports_deadlock() {
        let mut k = init(SimMachine::new(), Config::new(ENTRY)).unwrap();
        k.platform_mut()
            .script(Event::sys(kaya_common::consts::PASSEREN, 0x2000_9000, 0, 0));

        assert_eq!(run(&mut k), Err(KernelPanic::Deadlock));
        assert!(k.platform().is_panicked());
        assert!(!k.platform().is_halted());
    }
}
