//! Test infrastructure for the Kaya nucleus.
//!
//! [`SimMachine`] is an in-memory uMPS stand-in: sparse word memory, the bus
//! registers the nucleus reads (TOD clock, time scale, interval timer, RAM
//! geometry), pending bitmaps and device registers that clear on `ACK`.
//! Traps are produced by [`Event`]s, either queued ahead of time for
//! [`boot::run`](crate::boot::run) or injected one at a time with
//! [`Kernel::inject`]. [`Kernel::check_accounting`] cross-checks the
//! counters against the descriptors between steps.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kaya_kernel::testutil::{Event, SimMachine};
//!
//! let mut kernel = boot::init(SimMachine::new(), Config::new(ENTRY))?;
//! kernel.schedule()?;
//! kernel.inject(Event::sys(GETPID, 0, 0, 0))?;
//! ```

use crate::process::BlockReason;
use crate::{Dispatch, Kernel};
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use kaya_common::consts::{
    device_register, pending_bitmap, BUS_INSTALLEDRAM, BUS_INTERVALTIMER, BUS_RAMBASEADDR,
    BUS_TIMESCALE, BUS_TODLOW, DEV_C_ACK, DEV_PER_INT, DEV_REGS_START, DEV_REG_COMMAND,
    DEV_REG_SIZE, DEV_REG_STATUS, DEV_S_READY, DEV_TRCV_S_CHARRECV, DEV_TTRS_S_CHARTRSM,
    DEV_USED_INTS, INT_LOWEST, INT_TERMINAL, INT_TIMER, TERM_R_COMMAND, TERM_R_STATUS,
    TERM_STATUS_MASK, TERM_T_COMMAND, TERM_T_STATUS, TERMINATEPROCESS,
};
use kaya_common::state::{cause_with_exc_code, cause_with_ip, REG_A0, REG_A1, REG_A2, REG_A3};
use kaya_common::{ExceptionCode, KernelResult, ProcessorState, Status};
use kaya_hal::{Bus, Platform, Processor, TrapVector};

/// Something that makes the simulated processor trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// `SYSCALL` with `a0 = request` and `a1..a3 = args`.
    Syscall {
        /// Request number.
        request: u32,
        /// `a1`, `a2`, `a3`.
        args: [u32; 3],
        /// Whether the caller ran in user mode.
        user: bool,
    },
    /// `BREAK`.
    Breakpoint,
    /// Address translation fault.
    Tlb,
    /// Program trap with the given code.
    ProgramTrap(ExceptionCode),
    /// The interval timer runs out.
    Timer,
    /// A device on lines 3..=6 completes with `status`.
    Device {
        /// Interrupt line.
        line: u8,
        /// Device index.
        device: u8,
        /// Value of the status register.
        status: u32,
    },
    /// A terminal completes; `None` leaves that half untouched.
    Terminal {
        /// Terminal index.
        device: u8,
        /// New transmitter status.
        transmitted: Option<u32>,
        /// New receiver status.
        received: Option<u32>,
    },
    /// Raise `line` without touching any register.
    Interrupt(u8),
}

impl Event {
    /// Kernel-mode syscall.
    pub const fn sys(request: u32, a1: u32, a2: u32, a3: u32) -> Self {
        Event::Syscall {
            request,
            args: [a1, a2, a3],
            user: false,
        }
    }

    /// User-mode syscall.
    pub const fn user_sys(request: u32, a1: u32, a2: u32, a3: u32) -> Self {
        Event::Syscall {
            request,
            args: [a1, a2, a3],
            user: true,
        }
    }
}

/// Simulated uMPS machine.
#[derive(Debug, Clone)]
pub struct SimMachine {
    memory: BTreeMap<u32, u32>,
    script: VecDeque<(u32, Event)>,
    resumed: Vec<ProcessorState>,
    idles: usize,
    halted: bool,
    panicked: bool,
}

impl Default for SimMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimMachine {
    /// Base of simulated RAM.
    pub const RAM_BASE: u32 = 0x2000_0000;
    /// Installed RAM.
    pub const RAM_SIZE: u32 = 0x0010_0000;
    /// Trampoline of the first trap vector; the others follow every 0x80.
    pub const TRAP_ENTRY: u32 = 0x1fc0_0180;

    /// A machine at time zero with one clock tick per microsecond.
    pub fn new() -> Self {
        let mut memory = BTreeMap::new();
        memory.insert(BUS_RAMBASEADDR, Self::RAM_BASE);
        memory.insert(BUS_INSTALLEDRAM, Self::RAM_SIZE);
        memory.insert(BUS_TIMESCALE, 1);
        Self {
            memory,
            script: VecDeque::new(),
            resumed: Vec::new(),
            idles: 0,
            halted: false,
            panicked: false,
        }
    }

    /// Use `scale` clock ticks per microsecond.
    pub fn with_timescale(mut self, scale: u32) -> Self {
        self.memory.insert(BUS_TIMESCALE, scale);
        self
    }

    /// Top of RAM.
    pub fn ramtop(&self) -> u32 {
        Self::RAM_BASE + Self::RAM_SIZE
    }

    /// Move the TOD clock forward by `micros`.
    pub fn advance(&mut self, micros: u32) {
        let scale = self.read_word(BUS_TIMESCALE);
        let tod = self.read_word(BUS_TODLOW);
        self.write_word(BUS_TODLOW, tod.wrapping_add(micros.wrapping_mul(scale)));
    }

    /// Microseconds armed in the interval timer.
    pub fn timer_micros(&self) -> u32 {
        self.read_word(BUS_INTERVALTIMER) / self.read_word(BUS_TIMESCALE).max(1)
    }

    /// Queue `event` for the next trap.
    pub fn script(&mut self, event: Event) {
        self.script.push_back((0, event));
    }

    /// Queue `event`, `micros` after the previous trap.
    pub fn script_after(&mut self, micros: u32, event: Event) {
        self.script.push_back((micros, event));
    }

    /// States loaded so far, oldest first.
    pub fn resumed(&self) -> &[ProcessorState] {
        &self.resumed
    }

    /// Number of times the processor idled.
    pub fn idles(&self) -> usize {
        self.idles
    }

    /// Whether the machine was halted.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Whether the machine panicked.
    pub fn is_panicked(&self) -> bool {
        self.panicked
    }

    /// Apply `event` and return the vector it fires. `running` is the state
    /// on the processor, `None` while idle.
    pub fn trap(&mut self, event: Event, running: Option<&ProcessorState>) -> TrapVector {
        let mut state = running.copied().unwrap_or_default();
        state.cause = 0;
        let (vector, code) = match event {
            Event::Syscall {
                request,
                args,
                user,
            } => {
                state.gpr[REG_A0] = request;
                state.gpr[REG_A1] = args[0];
                state.gpr[REG_A2] = args[1];
                state.gpr[REG_A3] = args[2];
                let mut status = state.status_flags();
                status.set(Status::KUP, user);
                state.set_status_flags(status);
                (TrapVector::SysBreak, ExceptionCode::Syscall)
            }
            Event::Breakpoint => (TrapVector::SysBreak, ExceptionCode::Breakpoint),
            Event::Tlb => (TrapVector::Tlb, ExceptionCode::TlbInvalidLoad),
            Event::ProgramTrap(code) => (TrapVector::ProgramTrap, code),
            Event::Timer => {
                let micros = self.timer_micros();
                self.advance(micros);
                state.cause = cause_with_ip(state.cause, INT_TIMER);
                (TrapVector::Interrupt, ExceptionCode::Interrupt)
            }
            Event::Device {
                line,
                device,
                status,
            } => {
                let base = device_register(line, device);
                self.write_word(base + DEV_REG_STATUS, status);
                self.set_pending(line, device);
                state.cause = cause_with_ip(state.cause, line);
                (TrapVector::Interrupt, ExceptionCode::Interrupt)
            }
            Event::Terminal {
                device,
                transmitted,
                received,
            } => {
                let base = device_register(INT_TERMINAL, device);
                if let Some(status) = transmitted {
                    self.write_word(base + TERM_T_STATUS, status);
                }
                if let Some(status) = received {
                    self.write_word(base + TERM_R_STATUS, status);
                }
                self.set_pending(INT_TERMINAL, device);
                state.cause = cause_with_ip(state.cause, INT_TERMINAL);
                (TrapVector::Interrupt, ExceptionCode::Interrupt)
            }
            Event::Interrupt(line) => {
                state.cause = cause_with_ip(state.cause, line);
                (TrapVector::Interrupt, ExceptionCode::Interrupt)
            }
        };
        state.cause = cause_with_exc_code(state.cause, code);
        self.write_state(vector.old_area(), &state);
        vector
    }

    fn set_pending(&mut self, line: u8, device: u8) {
        let addr = pending_bitmap(line);
        let bitmap = self.read_word(addr);
        self.write_word(addr, bitmap | (1 << device));
    }

    fn clear_pending(&mut self, line: u8, device: u8) {
        let addr = pending_bitmap(line);
        let bitmap = self.read_word(addr);
        self.memory.insert(addr, bitmap & !(1 << device));
    }

    /// Device acknowledgements: reset the status and drop the pending bit
    /// once nothing else is outstanding.
    fn acknowledge(&mut self, addr: u32) {
        let offset = addr - DEV_REGS_START;
        let line = INT_LOWEST + (offset / (DEV_REG_SIZE * DEV_PER_INT as u32)) as u8;
        let device = ((offset / DEV_REG_SIZE) % DEV_PER_INT as u32) as u8;
        let base = device_register(line, device);

        if line != INT_TERMINAL {
            if addr == base + DEV_REG_COMMAND {
                self.memory.insert(base + DEV_REG_STATUS, DEV_S_READY);
                self.clear_pending(line, device);
            }
            return;
        }
        match addr - base {
            TERM_T_COMMAND => {
                self.memory.insert(base + TERM_T_STATUS, DEV_S_READY);
            }
            TERM_R_COMMAND => {
                self.memory.insert(base + TERM_R_STATUS, DEV_S_READY);
            }
            _ => return,
        }
        let transmit = self.read_word(base + TERM_T_STATUS) & TERM_STATUS_MASK;
        let receive = self.read_word(base + TERM_R_STATUS) & TERM_STATUS_MASK;
        if transmit != DEV_TTRS_S_CHARTRSM && receive != DEV_TRCV_S_CHARRECV {
            self.clear_pending(line, device);
        }
    }

    fn next_event(&mut self) -> Option<Event> {
        let (delay, event) = self.script.pop_front()?;
        self.advance(delay);
        Some(event)
    }
}

impl Bus for SimMachine {
    fn read_word(&self, addr: u32) -> u32 {
        self.memory.get(&addr).copied().unwrap_or(0)
    }

    fn write_word(&mut self, addr: u32, value: u32) {
        self.memory.insert(addr, value);
        let devices_end = DEV_REGS_START + DEV_REG_SIZE * (DEV_PER_INT * DEV_USED_INTS) as u32;
        if (DEV_REGS_START..devices_end).contains(&addr) && value == DEV_C_ACK {
            self.acknowledge(addr);
        }
    }
}

impl Processor for SimMachine {
    fn store_state(&self) -> ProcessorState {
        let mut state = ProcessorState::default();
        state.set_status_flags(
            Status::IEC | Status::KUC | Status::INT_UNMASKED | Status::VMC | Status::VMP,
        );
        state
    }

    fn trap_entry(&self, vector: TrapVector) -> u32 {
        let slot = TrapVector::ALL
            .iter()
            .position(|&v| v == vector)
            .unwrap_or(0) as u32;
        Self::TRAP_ENTRY + slot * 0x80
    }

    /// Runs `state` until the next scripted event. An empty script ends the
    /// process with a self-termination.
    fn resume(&mut self, state: &ProcessorState) -> TrapVector {
        self.resumed.push(*state);
        let event = self
            .next_event()
            .unwrap_or(Event::sys(TERMINATEPROCESS, u32::MAX, 0, 0));
        self.trap(event, Some(state))
    }

    /// Waits for the next scripted event, or for the interval timer when
    /// none is left.
    fn wait_for_interrupt(&mut self) {
        self.idles += 1;
        let event = self.next_event().unwrap_or(Event::Timer);
        self.trap(event, None);
    }

    fn halt(&mut self) {
        self.halted = true;
    }

    fn panic(&mut self) {
        self.panicked = true;
    }
}

impl Kernel<SimMachine> {
    /// Raise `event` on the running process (or the idle processor) and
    /// handle the trap.
    pub fn inject(&mut self, event: Event) -> KernelResult<Dispatch> {
        let running = self.sched.current.map(|h| self.procs.get(h).state);
        let vector = self.platform.trap(event, running.as_ref());
        self.dispatch(vector)
    }
}

impl<P: Platform> Kernel<P> {
    /// Panic unless every counter agrees with the descriptors it counts.
    ///
    /// Each allocated descriptor must be exactly one of running, ready or
    /// queued on a semaphore, be reachable through the pid table and be
    /// linked both ways with its parent.
    pub fn check_accounting(&self) {
        let live = self.procs.live();
        assert_eq!(self.sched.process_count as usize, live, "process_count");
        assert_eq!(self.pids.len(), live, "pid table size");
        assert_eq!(self.pids.is_empty(), live == 0, "pid table emptiness");

        let mut soft = 0;
        let mut queued = 0;
        for handle in self.procs.handles() {
            let pcb = self.procs.get(handle);
            assert_eq!(self.pids.lookup(pcb.pid), Some(handle), "{:?} lookup", pcb.pid);

            let running = self.sched.current == Some(handle);
            let ready = self.ready.contains(handle);
            let waiting = pcb.sem_key.is_some();
            assert_eq!(
                usize::from(running) + usize::from(ready) + usize::from(waiting),
                1,
                "{:?} must be in exactly one place",
                pcb.pid
            );
            assert_eq!(waiting, pcb.blocked != BlockReason::None, "{:?} reason", pcb.pid);
            if let Some(key) = pcb.sem_key {
                assert!(self.asl.waiters(key) > 0, "{:?} not on {:?}", pcb.pid, key);
                queued += 1;
            }
            if pcb.blocked.is_soft() {
                soft += 1;
            }

            if let Some(parent) = pcb.parent {
                assert!(self.procs.is_allocated(parent), "{:?} orphaned", pcb.pid);
                assert!(self.procs.children(parent).contains(&handle));
            }
            for &child in self.procs.children(handle) {
                assert_eq!(self.procs.get(child).parent, Some(handle));
            }
        }
        assert_eq!(self.sched.soft_block_count, soft, "soft_block_count");

        let waiters: usize = self.asl.active_keys().map(|key| self.asl.waiters(key)).sum();
        assert_eq!(waiters, queued, "semaphore queues");
        assert!(self.ready.iter().all(|h| self.procs.is_allocated(h)));
        if let Some(current) = self.sched.current {
            assert!(self.procs.is_allocated(current), "current freed");
        }
    }
}
