//! Counting semaphores for nucleus processes.
//!
//! A semaphore is identified by a [`SemKey`]. Its value lives either in user
//! memory (user semaphores, keyed by address) or in the kernel
//! ([`SemaphoreRegistry`]: device semaphores and the pseudo-clock). Processes
//! blocked on it queue in a descriptor of the [`SemaphoreDirectory`].
//!
//! # Primitives
//!
//! - [`SemaphoreDirectory`]: active/free descriptor lists with FIFO wait queues
//! - [`SemaphoreRegistry`]: kernel-owned semaphore values and device status words

pub mod registry;
mod semaphore;

pub use registry::SemaphoreRegistry;
pub use semaphore::SemaphoreDirectory;

use kaya_common::consts::{
    DEV_PER_INT, INT_DISK, INT_PRINTER, INT_TAPE, INT_TERMINAL, INT_UNUSED,
};

/// Device semaphore families, in status-table row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceClass {
    /// Disks (line 3).
    Disk,
    /// Tapes (line 4).
    Tape,
    /// Network adapters (line 5).
    Network,
    /// Printers (line 6).
    Printer,
    /// Terminal transmitters (line 7).
    TerminalTransmit,
    /// Terminal receivers (line 7), one row past the transmitters.
    TerminalReceive,
}

impl DeviceClass {
    /// Row of this class in the semaphore and status tables.
    pub const fn row(self) -> usize {
        self as usize
    }

    /// Class served by `line`; `read` picks the terminal direction.
    pub fn for_line(line: u32, read: bool) -> Option<Self> {
        match u8::try_from(line).ok()? {
            INT_DISK => Some(DeviceClass::Disk),
            INT_TAPE => Some(DeviceClass::Tape),
            INT_UNUSED => Some(DeviceClass::Network),
            INT_PRINTER => Some(DeviceClass::Printer),
            INT_TERMINAL if read => Some(DeviceClass::TerminalReceive),
            INT_TERMINAL => Some(DeviceClass::TerminalTransmit),
            _ => None,
        }
    }
}

/// A single device semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceKey {
    /// Device family.
    pub class: DeviceClass,
    /// Index on the interrupt line.
    pub device: u8,
}

impl DeviceKey {
    /// Key for `device` of `class`; `None` if the index is out of range.
    pub fn new(class: DeviceClass, device: u32) -> Option<Self> {
        if (device as usize) < DEV_PER_INT {
            Some(Self {
                class,
                device: device as u8,
            })
        } else {
            None
        }
    }
}

/// Identity of a semaphore, totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SemKey {
    /// A device completion semaphore.
    Device(DeviceKey),
    /// The pseudo-clock semaphore.
    PseudoClock,
    /// A user semaphore at a memory address.
    User(u32),
}
