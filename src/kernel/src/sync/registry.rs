//! Semaphore values.
//!
//! Device semaphores, the pseudo-clock and the device status words belong to
//! the kernel; user semaphores are signed words in platform memory at the
//! address their key names.

use super::{DeviceKey, SemKey};
use kaya_common::consts::{DEV_PER_INT, STATUS_WORD_ROWS};
use kaya_hal::Bus;

/// Kernel-owned semaphore cells and the status-word table.
#[derive(Debug, Clone, Default)]
pub struct SemaphoreRegistry {
    devices: [[i32; DEV_PER_INT]; STATUS_WORD_ROWS],
    pseudo_clock: i32,
    status_words: [[u32; DEV_PER_INT]; STATUS_WORD_ROWS],
}

impl SemaphoreRegistry {
    /// All semaphores at zero, no status latched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`.
    pub fn value<B: Bus + ?Sized>(&self, bus: &B, key: SemKey) -> i32 {
        match key {
            SemKey::Device(dev) => self.devices[dev.class.row()][dev.device as usize],
            SemKey::PseudoClock => self.pseudo_clock,
            SemKey::User(addr) => bus.read_word(addr) as i32,
        }
    }

    /// Add `delta` to `key` and return the new value.
    ///
    /// Values saturate at the `i32` bounds, so a pseudo-clock that keeps
    /// ticking with nobody waiting never flips sign.
    pub fn adjust<B: Bus + ?Sized>(&mut self, bus: &mut B, key: SemKey, delta: i32) -> i32 {
        match key {
            SemKey::Device(dev) => {
                let cell = &mut self.devices[dev.class.row()][dev.device as usize];
                *cell = cell.saturating_add(delta);
                *cell
            }
            SemKey::PseudoClock => {
                self.pseudo_clock = self.pseudo_clock.saturating_add(delta);
                self.pseudo_clock
            }
            SemKey::User(addr) => {
                let value = (bus.read_word(addr) as i32).saturating_add(delta);
                bus.write_word(addr, value as u32);
                value
            }
        }
    }

    /// Value of the pseudo-clock semaphore.
    pub fn pseudo_clock(&self) -> i32 {
        self.pseudo_clock
    }

    /// Remember a completion nobody was waiting for.
    pub fn latch(&mut self, dev: DeviceKey, status: u32) {
        self.status_words[dev.class.row()][dev.device as usize] = status;
    }

    /// Last status latched for `dev`.
    pub fn status_word(&self, dev: DeviceKey) -> u32 {
        self.status_words[dev.class.row()][dev.device as usize]
    }
}
