//! x86_64 architecture specifics.
#[cfg(target_arch = "x86_64")]
pub mod intrinsics;
#[cfg(target_arch = "x86_64")]
pub mod pio;

bitflags::bitflags! {
    /// The RFLAGS register.
    pub struct Rflags: usize {
        /// Carry flag.
        const CF = 1 << 0;
        #[doc(hidden)] const _1 = 1 << 1;
        /// Parity flag.
        const PF = 1 << 2;
        /// Auxiliary carry flag.
        const AF = 1 << 4;
        /// Zero flag.
        const ZF = 1 << 6;
        /// Sign flag.
        const SF = 1 << 7;
        /// Trap flag.
        const TF = 1 << 8;
        /// Interrupt enable flag.
        const IF = 1 << 9;
        /// Direction flag.
        const DF = 1 << 10;
        /// Overflow flag.
        const OF = 1 << 11;
        /// I/O privilege level (two bits).
        const IOPL = 3 << 12;
        /// Nested task flag.
        const NT = 1 << 14;
        /// Resume flag.
        const RF = 1 << 16;
        /// Virtual 8086 mode flag.
        const VM = 1 << 17;
        /// Alignment check.
        const AC = 1 << 18;
        /// Virtual interrupt flag.
        const VIF = 1 << 19;
        /// Virtual interrupt pending.
        const VIP = 1 << 20;
        /// CPUID instruction available.
        const ID = 1 << 21;
    }
}
