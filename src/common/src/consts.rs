//! Platform constants shared by the nucleus and the platform layer.
//!
//! Addresses and register offsets describe the uMPS machine the nucleus runs
//! on; everything here is fixed at compile time.

/// Maximum number of concurrent processes (and semaphore descriptors).
pub const MAXPROC: usize = 20;

/// Size of a machine word in bytes.
pub const WORD_SIZE: u32 = 4;

/// Physical frame size.
pub const FRAME_SIZE: u32 = 4096;

/// Number of general purpose registers saved in a processor state.
pub const NREG: usize = 29;

// Trap old/new areas in the ROM reserved frame.

/// Interrupt new area.
pub const INT_NEWAREA: u32 = 0x2000_008c;
/// Interrupt old area.
pub const INT_OLDAREA: u32 = 0x2000_0000;
/// TLB new area.
pub const TLB_NEWAREA: u32 = 0x2000_01a4;
/// TLB old area.
pub const TLB_OLDAREA: u32 = 0x2000_0118;
/// Program trap new area.
pub const PGMTRAP_NEWAREA: u32 = 0x2000_02bc;
/// Program trap old area.
pub const PGMTRAP_OLDAREA: u32 = 0x2000_0230;
/// Syscall/breakpoint new area.
pub const SYSBK_NEWAREA: u32 = 0x2000_03d4;
/// Syscall/breakpoint old area.
pub const SYSBK_OLDAREA: u32 = 0x2000_0348;

// Nucleus syscall request numbers.

/// SYS1: create a child process.
pub const CREATEPROCESS: u32 = 1;
/// SYS2: terminate a process and its progeny.
pub const TERMINATEPROCESS: u32 = 2;
/// SYS3: V on a semaphore.
pub const VERHOGEN: u32 = 3;
/// SYS4: P on a semaphore.
pub const PASSEREN: u32 = 4;
/// SYS5: caller's pid.
pub const GETPID: u32 = 5;
/// SYS6: caller's CPU time.
pub const GETCPUTIME: u32 = 6;
/// SYS7: wait for the next pseudo-clock tick.
pub const WAITCLOCK: u32 = 7;
/// SYS8: wait for a device completion.
pub const WAITIO: u32 = 8;
/// SYS9: parent's pid.
pub const GETPPID: u32 = 9;
/// SYS10: delegate TLB exceptions.
pub const SPECTLBVECT: u32 = 10;
/// SYS11: delegate program traps.
pub const SPECPGMVECT: u32 = 11;
/// SYS12: delegate syscalls and breakpoints.
pub const SPECSYSVECT: u32 = 12;

/// Highest request number reserved for the nucleus.
pub const SYSCALL_MAX: u32 = 12;

// Bus register area.

/// RAM base address register.
pub const BUS_RAMBASEADDR: u32 = 0x1000_0000;
/// Installed RAM size register.
pub const BUS_INSTALLEDRAM: u32 = 0x1000_0004;
/// Elapsed clock ticks since power on (low word).
pub const BUS_TODLOW: u32 = 0x1000_001c;
/// Interval timer register.
pub const BUS_INTERVALTIMER: u32 = 0x1000_0020;
/// Clock ticks per microsecond.
pub const BUS_TIMESCALE: u32 = 0x1000_0024;

/// First pending-interrupt bitmap; line `n` is at `+ WORD_SIZE * (n - 3)`.
pub const PENDING_BITMAP_START: u32 = 0x1000_003c;

/// First device register.
pub const DEV_REGS_START: u32 = 0x1000_0050;
/// Size of one device register.
pub const DEV_REG_SIZE: u32 = 4 * WORD_SIZE;
/// Size of the register block of one interrupt line.
pub const DEV_REGBLOCK_SIZE: u32 = DEV_REG_SIZE * DEV_PER_INT as u32;

// Interrupt lines.

/// Interval timer line.
pub const INT_TIMER: u8 = 2;
/// Lowest line used by real devices.
pub const INT_LOWEST: u8 = 3;
/// Disk line.
pub const INT_DISK: u8 = 3;
/// Tape line.
pub const INT_TAPE: u8 = 4;
/// Unused (network) line.
pub const INT_UNUSED: u8 = 5;
/// Printer line.
pub const INT_PRINTER: u8 = 6;
/// Terminal line.
pub const INT_TERMINAL: u8 = 7;

/// Number of lines reserved for devices.
pub const DEV_USED_INTS: usize = 5;
/// Devices per interrupt line.
pub const DEV_PER_INT: usize = 8;

// Device register words.

/// Status register offset.
pub const DEV_REG_STATUS: u32 = 0x0;
/// Command register offset.
pub const DEV_REG_COMMAND: u32 = 0x4;
/// First data register offset.
pub const DEV_REG_DATA0: u32 = 0x8;
/// Second data register offset.
pub const DEV_REG_DATA1: u32 = 0xc;

/// Terminal receiver status offset.
pub const TERM_R_STATUS: u32 = 0x0;
/// Terminal receiver command offset.
pub const TERM_R_COMMAND: u32 = 0x4;
/// Terminal transmitter status offset.
pub const TERM_T_STATUS: u32 = 0x8;
/// Terminal transmitter command offset.
pub const TERM_T_COMMAND: u32 = 0xc;

// Device commands and status codes.

/// Acknowledge, common to all devices.
pub const DEV_C_ACK: u32 = 1;
/// Device ready, common to all devices.
pub const DEV_S_READY: u32 = 1;
/// Terminal receiver: character received.
pub const DEV_TRCV_S_CHARRECV: u32 = 5;
/// Terminal transmitter: character transmitted.
pub const DEV_TTRS_S_CHARTRSM: u32 = 5;
/// Mask selecting the status byte of a terminal sub-device.
pub const TERM_STATUS_MASK: u32 = 0xff;

/// Rows of the device semaphore and status-word tables.
pub const STATUS_WORD_ROWS: usize = 6;

// Scheduling constants, in microseconds.

/// Quantum granted to a process before preemption.
pub const SCHED_TIME_SLICE: u32 = 5_000;
/// Pseudo-clock tick length.
pub const SCHED_PSEUDO_CLOCK: u32 = 100_000;

/// Pid of the bootstrap process.
pub const ROOT_PID: u32 = 1;

/// Register offset of device `dev` on `line`.
pub const fn device_register(line: u8, dev: u8) -> u32 {
    DEV_REGS_START + (line - INT_LOWEST) as u32 * DEV_REGBLOCK_SIZE + dev as u32 * DEV_REG_SIZE
}

/// Address of the pending-interrupt bitmap of `line`.
pub const fn pending_bitmap(line: u8) -> u32 {
    PENDING_BITMAP_START + WORD_SIZE * (line - INT_LOWEST) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_register_layout() {
        assert_eq!(device_register(INT_DISK, 0), DEV_REGS_START);
        assert_eq!(device_register(INT_DISK, 2), DEV_REGS_START + 0x20);
        assert_eq!(device_register(INT_TERMINAL, 1), DEV_REGS_START + 4 * 0x80 + 0x10);
    }

    #[test]
    fn test_pending_bitmap_layout() {
        assert_eq!(pending_bitmap(INT_DISK), PENDING_BITMAP_START);
        assert_eq!(pending_bitmap(INT_TERMINAL), PENDING_BITMAP_START + 16);
    }
}
