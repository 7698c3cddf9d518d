//! System-wide error types for the Kaya nucleus.

use core::fmt;

/// Unrecoverable nucleus conditions.
///
/// Every variant halts the machine: the driver loop hands it to the
/// platform's panic primitive and never resumes a process afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KernelPanic {
    /// No free process descriptor for a kernel-initiated allocation
    ProcessPoolExhausted,
    /// No free semaphore descriptor for a blocking wait
    SemaphorePoolExhausted,
    /// Live processes exist but none is ready or soft-blocked
    Deadlock,
    /// A process trap arrived with no current process
    NoCurrentProcess,
    /// An exception code the vector does not handle
    UnexpectedException(u32),
    /// WaitIO named a line or device that does not exist
    InvalidDevice {
        /// Interrupt line requested.
        line: u32,
        /// Device index requested.
        device: u32,
    },
    /// The bus reports RAM that does not fit the address space or cannot
    /// hold the root stack frame
    BadRamGeometry {
        /// Reported RAM base.
        base: u32,
        /// Reported RAM size.
        size: u32,
    },
}

impl fmt::Display for KernelPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelPanic::ProcessPoolExhausted => write!(f, "process pool exhausted"),
            KernelPanic::SemaphorePoolExhausted => write!(f, "semaphore descriptor pool exhausted"),
            KernelPanic::Deadlock => write!(f, "deadlock: no ready and no soft-blocked process"),
            KernelPanic::NoCurrentProcess => write!(f, "trap with no current process"),
            KernelPanic::UnexpectedException(code) => {
                write!(f, "unexpected exception code {}", code)
            }
            KernelPanic::InvalidDevice { line, device } => {
                write!(f, "invalid device {} on line {}", device, line)
            }
            KernelPanic::BadRamGeometry { base, size } => {
                write!(f, "bad RAM geometry: {:#x} bytes at {:#010x}", size, base)
            }
        }
    }
}

/// Result type of every nucleus entry point.
pub type KernelResult<T> = Result<T, KernelPanic>;
