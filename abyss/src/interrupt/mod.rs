//! Interrupt
//!
//! The layout of the trap frame pushed by the interrupt entry stubs. The
//! monitor receives it when it is entered from a trap and prints it as the
//! header of a session.
use crate::x86_64::Rflags;

/// X86_64's general purpose registers.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct GeneralPurposeRegisters {
    /// R15 register.
    pub r15: usize,
    /// R14 register.
    pub r14: usize,
    /// R13 register.
    pub r13: usize,
    /// R12 register.
    pub r12: usize,
    /// R11 register.
    pub r11: usize,
    /// R10 register.
    pub r10: usize,
    /// R9 register.
    pub r9: usize,
    /// R8 register.
    pub r8: usize,
    /// RSI register.
    pub rsi: usize,
    /// RDI register.
    pub rdi: usize,
    /// RBP register.
    pub rbp: usize,
    /// RDX register.
    pub rdx: usize,
    /// RCX register.
    pub rcx: usize,
    /// RBX register.
    pub rbx: usize,
    /// RAX register.
    pub rax: usize,
}

/// The frame the processor pushes on an interrupt or exception.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct InterruptStackFrame {
    /// Instruction pointer at the time of the trap.
    pub rip: usize,
    /// Code segment selector.
    pub cs: u16,
    #[doc(hidden)]
    pub __pad0: u16,
    #[doc(hidden)]
    pub __pad1: u32,
    /// RFLAGS at the time of the trap.
    pub rflags: Rflags,
    /// Stack pointer at the time of the trap.
    pub rsp: usize,
    /// Stack segment selector.
    pub ss: u16,
    #[doc(hidden)]
    pub __pad2: u16,
    #[doc(hidden)]
    pub __pad3: u32,
}

/// x86_64 Trap frame.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Registers {
    /// General purpose registers saved by the entry stub.
    pub gprs: GeneralPurposeRegisters,
    /// Error code of the exception, or 0.
    pub error_code: u64,
    /// Frame pushed by the processor.
    pub interrupt_stack_frame: InterruptStackFrame,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// Creates a zeroed trap frame with interrupts enabled.
    #[inline]
    pub fn new() -> Self {
        Self {
            gprs: GeneralPurposeRegisters::default(),
            error_code: 0,
            interrupt_stack_frame: InterruptStackFrame {
                rip: 0,
                cs: 0,
                __pad0: 0,
                __pad1: 0,
                rflags: Rflags::IF | Rflags::_1,
                rsp: 0,
                ss: 0,
                __pad2: 0,
                __pad3: 0,
            },
        }
    }
}

impl core::fmt::Debug for Registers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(
            f,
            "RAX: {:016x} | RBX: {:016x}  | RCX: {:016x} | RDX: {:016x}\n\
             RSI: {:016x} | RDI: {:016x}  | RBP: {:016x} | RSP: {:016x}\n\
             R8 : {:016x} | R9 : {:016x}  | R10: {:016x} | R11: {:016x}\n\
             R12: {:016x} | R13: {:016x}  | R14: {:016x} | R15: {:016x}\n\
             RIP: {:016x} | Error Code: {:#x} | RFLAGS: {:016x} [{:?}]\n\
             CS:  {:#06x}   | SS: {:#06x}",
            self.gprs.rax,
            self.gprs.rbx,
            self.gprs.rcx,
            self.gprs.rdx,
            self.gprs.rsi,
            self.gprs.rdi,
            self.gprs.rbp,
            self.interrupt_stack_frame.rsp,
            self.gprs.r8,
            self.gprs.r9,
            self.gprs.r10,
            self.gprs.r11,
            self.gprs.r12,
            self.gprs.r13,
            self.gprs.r14,
            self.gprs.r15,
            self.interrupt_stack_frame.rip,
            self.error_code,
            self.interrupt_stack_frame.rflags.bits(),
            self.interrupt_stack_frame.rflags,
            self.interrupt_stack_frame.cs,
            self.interrupt_stack_frame.ss,
        )
    }
}
