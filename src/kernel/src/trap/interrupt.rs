//! Interrupt handler.
//!
//! One line is serviced per trap, lowest line number first; anything else
//! still pending traps again as soon as interrupts are re-enabled.

use crate::sync::{DeviceClass, DeviceKey, SemKey};
use crate::{Dispatch, Kernel};
use kaya_common::consts::{
    device_register, pending_bitmap, DEV_C_ACK, DEV_REG_COMMAND, DEV_REG_STATUS,
    DEV_TRCV_S_CHARRECV, DEV_TTRS_S_CHARTRSM, INT_DISK, INT_TERMINAL, INT_TIMER, TERM_R_COMMAND,
    TERM_R_STATUS, TERM_STATUS_MASK, TERM_T_COMMAND, TERM_T_STATUS,
};
use kaya_common::state::cause_ip;
use kaya_common::KernelResult;
use kaya_hal::{Platform, TrapVector};

impl<P: Platform> Kernel<P> {
    /// Interrupt taken while a process ran, or while idle.
    pub fn on_interrupt(&mut self) -> KernelResult<Dispatch> {
        let trap = self.platform.read_state(TrapVector::Interrupt.old_area());
        if let Some(current) = self.sched.current {
            self.procs.get_mut(current).state = trap;
            self.charge_current();
        }

        let cause = trap.cause;
        if cause_ip(cause, INT_TIMER) {
            self.on_timer();
        } else if let Some(line) = (INT_DISK..INT_TERMINAL).find(|&line| cause_ip(cause, line)) {
            self.on_device(line);
        } else if cause_ip(cause, INT_TERMINAL) {
            self.on_terminal();
        } else {
            log::warn!("interrupt with no pending device line (cause {:#010x})", cause);
        }
        self.schedule()
    }

    fn on_timer(&mut self) {
        self.fold_tick();
        if self.sched.timer_tick >= self.config.pseudo_clock {
            self.pseudo_clock_tick();
            self.sched.timer_tick = 0;
        } else if let Some(current) = self.sched.current.take() {
            log::trace!("quantum expired for {:?}", self.procs.get(current).pid);
            self.ready.enqueue(current);
        }
    }

    /// V the pseudo-clock: release every waiter if any, else leave a
    /// pending tick.
    fn pseudo_clock_tick(&mut self) {
        let key = SemKey::PseudoClock;
        if self.sems.pseudo_clock() < 0 {
            while self.sems.pseudo_clock() < 0 {
                self.wake(key);
                self.sems.adjust(&mut self.platform, key, 1);
            }
        } else if self.wake(key).is_some() {
            self.sems.adjust(&mut self.platform, key, 1);
        } else {
            self.sems.adjust(&mut self.platform, key, -1);
        }
        log::trace!("pseudo-clock tick");
    }

    /// Lowest device with a pending interrupt on `line`.
    fn pending_device(&self, line: u8) -> Option<u8> {
        let bitmap = self.platform.read_word(pending_bitmap(line)) & 0xff;
        if bitmap == 0 {
            log::warn!("line {} raised with an empty bitmap", line);
            return None;
        }
        Some(bitmap.trailing_zeros() as u8)
    }

    fn on_device(&mut self, line: u8) {
        let Some(device) = self.pending_device(line) else {
            return;
        };
        let Some(dev) = DeviceClass::for_line(line as u32, false)
            .and_then(|class| DeviceKey::new(class, device as u32))
        else {
            return;
        };
        let base = device_register(line, device);
        let status = self.platform.read_word(base + DEV_REG_STATUS);
        self.complete(dev, status);
        self.platform.write_word(base + DEV_REG_COMMAND, DEV_C_ACK);
    }

    fn on_terminal(&mut self) {
        let Some(device) = self.pending_device(INT_TERMINAL) else {
            return;
        };
        let base = device_register(INT_TERMINAL, device);
        let transmit = self.platform.read_word(base + TERM_T_STATUS);
        let receive = self.platform.read_word(base + TERM_R_STATUS);

        let (class, status, command) = if transmit & TERM_STATUS_MASK == DEV_TTRS_S_CHARTRSM {
            (DeviceClass::TerminalTransmit, transmit, TERM_T_COMMAND)
        } else if receive & TERM_STATUS_MASK == DEV_TRCV_S_CHARRECV {
            (DeviceClass::TerminalReceive, receive, TERM_R_COMMAND)
        } else {
            log::warn!("terminal {} interrupt with nothing completed", device);
            return;
        };
        if let Some(dev) = DeviceKey::new(class, device as u32) {
            self.complete(dev, status);
        }
        self.platform.write_word(base + command, DEV_C_ACK);
    }

    /// V a device semaphore, handing `status` to the waiter or latching it.
    fn complete(&mut self, dev: DeviceKey, status: u32) {
        let key = SemKey::Device(dev);
        self.sems.adjust(&mut self.platform, key, 1);
        match self.wake(key) {
            Some(waiter) => self.procs.get_mut(waiter).state.set_v0(status),
            None => self.sems.latch(dev, status),
        }
    }
}
