//! Kaya ABI types shared by the nucleus and the platform layer.
//!
//! - [`consts`]: machine addresses, syscall numbers, scheduling constants
//! - [`state`]: the saved processor state and register helpers
//! - [`error`]: fatal nucleus conditions

#![no_std]
#![warn(missing_docs)]

pub mod consts;
pub mod error;
pub mod state;

pub use error::{KernelPanic, KernelResult};
pub use state::{ExceptionCode, ProcessorState, Status};
