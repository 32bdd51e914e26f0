//! # KMON: the KeOS kernel monitor
//!
//! An interactive console embedded in the kernel. When the kernel drops into
//! it (at boot, or from a trap handler), a developer can type commands on the
//! serial line to look at the live machine:
//!
//! ```text
//! Welcome to the KeOS kernel monitor!
//! Type 'help' for a list of commands.
//! K> showmap 0x400000 2
//! VA: 0x00400000, PA: 0x00100000, U-bit: 1, W-bit: 1
//! VA: 0x00401000, PA: No Mapping
//! K> backtrace
//! Stack backtrace:
//! rbp ffff800000fffe70  rip ffffff000010a2b4  args ...
//!      src/command.rs:214: kmon::command::mon_backtrace+84
//! ...
//! ```
//!
//! The two inspections at the heart of the monitor are
//! - [`backtrace`]: walking the chain of saved frame pointers and resolving
//!   each return address with the kernel's [`debug_info`], and
//! - [`showmap`]: walking the page table for each page of a range of virtual
//!   addresses.
//!
//! Both read memory only through the bounds-checked views of
//! [`mm::memory`], so inspecting a corrupted stack or page table reports
//! garbage instead of faulting.
//!
//! ## Layout
//!
//! Everything except [`kernel`] is plain `no_std` + `alloc` code that talks to
//! the machine through traits ([`debug_info::DebugInfo`],
//! [`mm::page_table::PageTableWalk`], [`teletype::Teletype`]) and views. This
//! is what makes the monitor testable on the host. [`kernel`] exists only
//! when building for the bare-metal target and binds those traits to the real
//! hardware.
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate abyss;
extern crate alloc;

pub mod backtrace;
pub mod command;
pub mod debug_info;
#[cfg(target_os = "none")]
pub mod kernel;
pub mod kerninfo;
pub mod mm;
pub mod monitor;
pub mod showmap;
pub mod teletype;
pub mod util;

pub use abyss::{addressing, debug, info, print, println, warning};
pub use command::{Env, MonitorError, Status};
pub use monitor::{MonitorConfig, monitor};
