//! Register intrinsics.
use core::arch::asm;

/// Reads the frame pointer (`rbp`) of the calling function.
///
/// Always inlined, so the value is the frame of the function the call is
/// written in. The kernel must be built with `-Cforce-frame-pointers=yes`.
#[inline(always)]
pub fn read_rbp() -> usize {
    let rbp: usize;
    unsafe {
        asm!("mov {}, rbp", out(reg) rbp, options(nomem, nostack, preserves_flags));
    }
    rbp
}

/// Returns the frame pointer of the function that calls `caller_rbp`.
///
/// The value is the `rbp` saved in the prologue of `caller_rbp` itself, so
/// it stays a live frame for as long as the caller runs. Unlike
/// [`read_rbp`], this can be taken as a `fn() -> usize`.
#[inline(never)]
pub fn caller_rbp() -> usize {
    let rbp: usize;
    unsafe {
        asm!("mov {}, [rbp]", out(reg) rbp, options(readonly, nostack, preserves_flags));
    }
    rbp
}

/// Reads the stack pointer (`rsp`).
#[inline(always)]
pub fn read_rsp() -> usize {
    let rsp: usize;
    unsafe {
        asm!("mov {}, rsp", out(reg) rsp, options(nomem, nostack, preserves_flags));
    }
    rsp
}

/// Reads the physical address of the active page table root from `cr3`.
///
/// # Safety
/// Privileged instruction: must run in ring 0.
#[inline]
pub unsafe fn read_cr3() -> usize {
    let cr3: usize;
    unsafe {
        asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
    }
    cr3 & !0xfff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_rbp_is_the_frame_of_the_caller() {
        let here = read_rbp();
        assert_ne!(here, 0);
        assert_eq!(caller_rbp(), here);
        // The saved return address sits right above the frame.
        let ret = unsafe { ((here + 8) as *const usize).read() };
        assert_ne!(ret, 0);
    }
}
