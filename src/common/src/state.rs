//! Processor state snapshot and register helpers.
//!
//! The layout of [`ProcessorState`] is fixed by the hardware: the processor
//! stores it into the old area of a trap and loads it on resume.

use crate::consts::NREG;
use bitflags::bitflags;

/// Number of words in a stored processor state.
pub const STATE_WORDS: usize = NREG + 6;

/// Index of `v0` (return value) in [`ProcessorState::gpr`].
pub const REG_V0: usize = 1;
/// Index of `a0` (request number) in [`ProcessorState::gpr`].
pub const REG_A0: usize = 3;
/// Index of `a1` in [`ProcessorState::gpr`].
pub const REG_A1: usize = 4;
/// Index of `a2` in [`ProcessorState::gpr`].
pub const REG_A2: usize = 5;
/// Index of `a3` in [`ProcessorState::gpr`].
pub const REG_A3: usize = 6;
/// Index of `t9` in [`ProcessorState::gpr`].
pub const REG_T9: usize = 24;
/// Index of `sp` in [`ProcessorState::gpr`].
pub const REG_SP: usize = 26;

bitflags! {
    /// Bits of the status register.
    ///
    /// The `c`/`p`/`o` suffixes are the current, previous and old slots of
    /// the KU/IE/VM stacks; a set KU bit means user mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Status: u32 {
        /// Interrupts enabled, current.
        const IEC = 0x0000_0001;
        /// User mode, current.
        const KUC = 0x0000_0002;
        /// Interrupts enabled, previous.
        const IEP = 0x0000_0004;
        /// User mode, previous.
        const KUP = 0x0000_0008;
        /// Interrupts enabled, old.
        const IEO = 0x0000_0010;
        /// User mode, old.
        const KUO = 0x0000_0020;
        /// Every interrupt line unmasked.
        const INT_UNMASKED = 0x0000_ff00;
        /// Virtual memory on, current.
        const VMC = 0x0100_0000;
        /// Virtual memory on, previous.
        const VMP = 0x0200_0000;
        /// Virtual memory on, old.
        const VMO = 0x0400_0000;

        const _ = !0;
    }
}

/// Exception codes found in `Cause.ExcCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum ExceptionCode {
    /// External interrupt.
    Interrupt = 0,
    /// TLB modification.
    TlbMod = 1,
    /// TLB invalid on load.
    TlbInvalidLoad = 2,
    /// TLB invalid on store.
    TlbInvalidStore = 3,
    /// Address error on load.
    AddressLoad = 4,
    /// Address error on store.
    AddressStore = 5,
    /// Bus error on fetch.
    BusFetch = 6,
    /// Bus error on load/store.
    BusLoadStore = 7,
    /// `SYSCALL` instruction.
    Syscall = 8,
    /// `BREAK` instruction.
    Breakpoint = 9,
    /// Reserved instruction.
    ReservedInstruction = 10,
    /// Coprocessor unusable.
    CoprocessorUnusable = 11,
    /// Arithmetic overflow.
    ArithmeticOverflow = 12,
    /// Bad page table entry.
    BadPte = 13,
    /// Page table entry miss.
    PteMiss = 14,
}

impl ExceptionCode {
    /// Decode a raw exception code.
    pub fn from_raw(code: u32) -> Option<Self> {
        use ExceptionCode::*;
        Some(match code {
            0 => Interrupt,
            1 => TlbMod,
            2 => TlbInvalidLoad,
            3 => TlbInvalidStore,
            4 => AddressLoad,
            5 => AddressStore,
            6 => BusFetch,
            7 => BusLoadStore,
            8 => Syscall,
            9 => Breakpoint,
            10 => ReservedInstruction,
            11 => CoprocessorUnusable,
            12 => ArithmeticOverflow,
            13 => BadPte,
            14 => PteMiss,
            _ => return None,
        })
    }
}

const EXCCODE_MASK: u32 = 0x0000_007c;
const EXCCODE_SHIFT: u32 = 2;
const CAUSE_IP_SHIFT: u32 = 8;

/// Extract the raw `ExcCode` field of a cause register.
pub const fn cause_exc_code(cause: u32) -> u32 {
    (cause & EXCCODE_MASK) >> EXCCODE_SHIFT
}

/// Replace the `ExcCode` field of a cause register.
pub const fn cause_with_exc_code(cause: u32, code: ExceptionCode) -> u32 {
    (cause & !EXCCODE_MASK) | ((code as u32) << EXCCODE_SHIFT)
}

/// Whether interrupt `line` is pending in a cause register.
pub const fn cause_ip(cause: u32, line: u8) -> bool {
    cause & (1 << (line as u32 + CAUSE_IP_SHIFT)) != 0
}

/// Set the pending bit of interrupt `line` in a cause register.
pub const fn cause_with_ip(cause: u32, line: u8) -> u32 {
    cause | (1 << (line as u32 + CAUSE_IP_SHIFT))
}

/// A saved processor state (`state_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessorState {
    /// EntryHi CP0 register.
    pub entry_hi: u32,
    /// Cause CP0 register.
    pub cause: u32,
    /// Status CP0 register.
    pub status: u32,
    /// Program counter.
    pub pc: u32,
    /// General purpose registers `$1`..`$29`.
    pub gpr: [u32; NREG],
    /// HI accumulator.
    pub hi: u32,
    /// LO accumulator.
    pub lo: u32,
}

impl ProcessorState {
    /// Rebuild a state from its in-memory word layout.
    pub fn from_words(words: &[u32; STATE_WORDS]) -> Self {
        let mut gpr = [0; NREG];
        gpr.copy_from_slice(&words[4..4 + NREG]);
        Self {
            entry_hi: words[0],
            cause: words[1],
            status: words[2],
            pc: words[3],
            gpr,
            hi: words[4 + NREG],
            lo: words[5 + NREG],
        }
    }

    /// The in-memory word layout of this state.
    pub fn to_words(&self) -> [u32; STATE_WORDS] {
        let mut words = [0; STATE_WORDS];
        words[0] = self.entry_hi;
        words[1] = self.cause;
        words[2] = self.status;
        words[3] = self.pc;
        words[4..4 + NREG].copy_from_slice(&self.gpr);
        words[4 + NREG] = self.hi;
        words[5 + NREG] = self.lo;
        words
    }

    /// Status register as flags.
    pub fn status_flags(&self) -> Status {
        Status::from_bits_retain(self.status)
    }

    /// Replace the status register.
    pub fn set_status_flags(&mut self, status: Status) {
        self.status = status.bits();
    }

    /// Whether the trap was taken from user mode (previous KU bit).
    pub fn from_user_mode(&self) -> bool {
        self.status_flags().contains(Status::KUP)
    }

    /// Decoded exception code, if known.
    pub fn exc_code(&self) -> Option<ExceptionCode> {
        ExceptionCode::from_raw(cause_exc_code(self.cause))
    }

    /// Request number register.
    pub fn a0(&self) -> u32 {
        self.gpr[REG_A0]
    }

    /// First syscall argument.
    pub fn a1(&self) -> u32 {
        self.gpr[REG_A1]
    }

    /// Second syscall argument.
    pub fn a2(&self) -> u32 {
        self.gpr[REG_A2]
    }

    /// Third syscall argument.
    pub fn a3(&self) -> u32 {
        self.gpr[REG_A3]
    }

    /// Return value register.
    pub fn v0(&self) -> u32 {
        self.gpr[REG_V0]
    }

    /// Set the return value register.
    pub fn set_v0(&mut self, value: u32) {
        self.gpr[REG_V0] = value;
    }

    /// Stack pointer.
    pub fn sp(&self) -> u32 {
        self.gpr[REG_SP]
    }

    /// Set the stack pointer.
    pub fn set_sp(&mut self, value: u32) {
        self.gpr[REG_SP] = value;
    }

    /// Point both `pc` and `t9` at `entry`, as the calling convention requires.
    pub fn set_entry(&mut self, entry: u32) {
        self.pc = entry;
        self.gpr[REG_T9] = entry;
    }
}
