//! Kaya Hardware Abstraction Layer (HAL) traits.
//!
//! This crate defines the boundary between the nucleus and the platform:
//! memory-mapped words, the trap areas, and the primitives that resume a
//! processor state, idle, or stop the machine.

#![no_std]

use kaya_common::consts::{
    INT_NEWAREA, INT_OLDAREA, PGMTRAP_NEWAREA, PGMTRAP_OLDAREA, SYSBK_NEWAREA, SYSBK_OLDAREA,
    TLB_NEWAREA, TLB_OLDAREA, WORD_SIZE,
};
use kaya_common::state::{ProcessorState, STATE_WORDS};

/// One of the four hardware trap vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrapVector {
    /// Address translation (TLB) exceptions.
    Tlb,
    /// Program traps.
    ProgramTrap,
    /// `SYSCALL` and `BREAK`.
    SysBreak,
    /// Device and timer interrupts.
    Interrupt,
}

impl TrapVector {
    /// All vectors, in installation order.
    pub const ALL: [TrapVector; 4] = [
        TrapVector::SysBreak,
        TrapVector::ProgramTrap,
        TrapVector::Tlb,
        TrapVector::Interrupt,
    ];

    /// Where the hardware saves the interrupted state.
    pub const fn old_area(self) -> u32 {
        match self {
            TrapVector::Tlb => TLB_OLDAREA,
            TrapVector::ProgramTrap => PGMTRAP_OLDAREA,
            TrapVector::SysBreak => SYSBK_OLDAREA,
            TrapVector::Interrupt => INT_OLDAREA,
        }
    }

    /// Where the hardware loads the handler state from.
    pub const fn new_area(self) -> u32 {
        match self {
            TrapVector::Tlb => TLB_NEWAREA,
            TrapVector::ProgramTrap => PGMTRAP_NEWAREA,
            TrapVector::SysBreak => SYSBK_NEWAREA,
            TrapVector::Interrupt => INT_NEWAREA,
        }
    }
}

/// Word-addressed access to memory and device registers.
pub trait Bus {
    /// Reads the word at `addr`.
    fn read_word(&self, addr: u32) -> u32;
    /// Writes `value` to the word at `addr`.
    fn write_word(&mut self, addr: u32, value: u32);

    /// Reads a processor state stored at `addr`.
    fn read_state(&self, addr: u32) -> ProcessorState {
        let mut words = [0; STATE_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = self.read_word(addr + i as u32 * WORD_SIZE);
        }
        ProcessorState::from_words(&words)
    }

    /// Stores `state` at `addr`.
    fn write_state(&mut self, addr: u32, state: &ProcessorState) {
        for (i, word) in state.to_words().iter().enumerate() {
            self.write_word(addr + i as u32 * WORD_SIZE, *word);
        }
    }
}

/// Processor primitives the nucleus cannot express itself.
pub trait Processor {
    /// Returns the current processor state (`STST`).
    fn store_state(&self) -> ProcessorState;
    /// Address of the platform trampoline for `vector`.
    fn trap_entry(&self, vector: TrapVector) -> u32;
    /// Loads `state` (`LDST`) and runs until the next trap, returning the
    /// vector that fired. The old area of that vector holds the saved state.
    fn resume(&mut self, state: &ProcessorState) -> TrapVector;
    /// Enables interrupts and waits for the next one.
    fn wait_for_interrupt(&mut self);
    /// Orderly shutdown.
    fn halt(&mut self);
    /// Unrecoverable stop.
    fn panic(&mut self);
}

/// Trait for a text-based console output.
pub trait Console {
    /// Writes a string to the console.
    fn write_str(&mut self, s: &str);
}

/// Everything the nucleus needs from a board.
pub trait Platform: Bus + Processor {}

impl<T: Bus + Processor> Platform for T {}
