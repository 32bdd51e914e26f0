//! Binding the monitor to the running kernel.
//!
//! The kernel calls [`init`] once while booting, then [`monitor`] whenever it
//! wants to drop into the monitor, e.g. from its breakpoint trap handler.
use crate::command::{Env, MonitorError};
use crate::debug_info::{DebugInfo, KernelDebugInfo};
use crate::kerninfo::KernelLayout;
use crate::mm::memory::{MemoryView, PhysicalMemory};
use crate::mm::page_table::PageTable;
use crate::monitor::MonitorConfig;
use crate::teletype::Serial;
use abyss::addressing::Pa;
use abyss::dev::x86_64::serial;
use abyss::interrupt::Registers;
use abyss::x86_64::intrinsics;
use alloc::boxed::Box;
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// Size of a kernel thread stack. Stacks are aligned to their size.
pub const STACK_SIZE: usize = 0x100000;

static DEBUG_INFO: AtomicPtr<KernelDebugInfo> = AtomicPtr::new(core::ptr::null_mut());
static PHYS_MEM_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Prepares the monitor.
///
/// Brings up COM1 and routes the kernel log to it, then loads the debug info
/// from the kernel ELF `image`. `phys_mem_size` is the amount of physical
/// memory covered by the direct map; page tables are read through it.
///
/// # Safety
/// Must be called once, before [`monitor`], on the bootstrap processor.
pub unsafe fn init(image: &[u8], phys_mem_size: usize) {
    unsafe {
        serial::init();
    }
    abyss::kprint::install_sink(serial::write_str);
    PHYS_MEM_SIZE.store(phys_mem_size, Ordering::SeqCst);

    info!("Monitor: load debug symbols.");
    match KernelDebugInfo::load(image) {
        Ok(debug_info) => {
            DEBUG_INFO.store(Box::into_raw(Box::new(debug_info)), Ordering::SeqCst);
        }
        Err(e) => warning!("Failed to read kernel image ({e}). Disabling stack backtrace."),
    }
}

/// The special symbols, as placed by the linker.
fn layout() -> KernelLayout {
    unsafe extern "C" {
        static _start: u8;
        static __executable_start: u8;
        static etext: u8;
        static edata: u8;
        static end: u8;
    }
    unsafe {
        KernelLayout {
            start: &_start as *const _ as usize,
            entry: &__executable_start as *const _ as usize,
            etext: &etext as *const _ as usize,
            edata: &edata as *const _ as usize,
            end: &end as *const _ as usize,
        }
    }
}

/// Runs a monitor session on COM1.
///
/// `tf` is the trap frame of the event that brought the kernel here, if any.
/// The session inspects the current thread's stack and the page table in
/// `cr3`.
pub fn monitor(config: MonitorConfig, tf: Option<&Registers>) -> Result<(), MonitorError> {
    let Some(root) = Pa::new(unsafe { intrinsics::read_cr3() }) else {
        warning!("Monitor: cr3 does not hold a physical address.");
        return Ok(());
    };
    let page_table = PageTable::new(root, unsafe {
        PhysicalMemory::direct_map(PHYS_MEM_SIZE.load(Ordering::SeqCst))
    });

    let stack_base = intrinsics::read_rsp() & !(STACK_SIZE - 1);
    // SAFETY: the current stack is mapped for as long as this function runs.
    let stack = unsafe { MemoryView::from_raw(stack_base, STACK_SIZE) };

    // SAFETY: set once by `init` and never freed.
    let debug_info = unsafe { DEBUG_INFO.load(Ordering::SeqCst).as_ref() };

    let env = Env {
        debug_info: debug_info.map(|d| d as &dyn DebugInfo),
        page_table: &page_table,
        stack,
        frame_pointer: intrinsics::caller_rbp,
        layout: Some(layout()),
        config,
    };
    crate::monitor::monitor(&env, &mut Serial::new(), tf)
}
