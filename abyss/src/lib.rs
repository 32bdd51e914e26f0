//! The abyss of kernel that operates hardwares.
//!
//! This crate collects the pieces of the kernel monitor that talk to the
//! machine directly: address types, the console printer, port I/O, register
//! intrinsics, the COM1 serial line, and the layout of a trap frame.
//!
//! Everything that executes privileged instructions is gated on
//! `target_arch = "x86_64"`, and nothing in this crate runs such an
//! instruction unless it is explicitly called. This keeps the crate usable on
//! a hosted target, where the monitor's tests run.
#![cfg_attr(not(test), no_std)]
#![allow(clippy::missing_safety_doc)]

use core::sync::atomic::AtomicBool;

#[doc(hidden)]
#[macro_use]
pub mod kprint;
pub mod addressing;
#[cfg(target_arch = "x86_64")]
pub mod dev;
pub mod interrupt;
pub mod x86_64;

pub use addressing::{Kva, PAGE_MASK, PAGE_SIZE, Pa, Va};
pub use interrupt::{GeneralPurposeRegisters, InterruptStackFrame, Registers};

/// Mutes the `info!`, `warning!` and `debug!` macros when set.
pub static QUIET: AtomicBool = AtomicBool::new(false);
