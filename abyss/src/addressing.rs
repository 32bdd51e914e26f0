//! Physical and Virtual Memory Addressing Schemes.
//!
//! The kernel maps all physical memory linearly into the upper half of the
//! address space: the first frame of physical memory is visible at
//! [`Pa::ZERO`]`.into_kva()`, the second right after it, and so on. Turning a
//! physical address into a kernel virtual address (and back) is therefore a
//! single addition or subtraction of a constant offset.
//!
//! Three wrapper types keep the address spaces apart: [`Kva`] for kernel
//! virtual addresses, [`Va`] for any canonical virtual address, and [`Pa`] for
//! physical addresses.
//!
//! ## Arithmetic Operations
//!
//! All three types support addition, subtraction and bitwise operations with a
//! `usize`. The arithmetic wraps at the machine word width, the same way the
//! hardware does; the monitor relies on that when a user asks for a range
//! running past the top of the address space.
//!
//! ```
//! use abyss::addressing::{Pa, PAGE_SIZE};
//!
//! let pa = Pa::new(0x1234_5000).unwrap();
//! let next = pa + PAGE_SIZE;
//! assert_eq!(next.into_usize(), 0x1234_6000);
//! ```

const VA_TO_PA_OFF: usize = 0xffff000000000000 | (510 << 39);

/// The size of a single page in memory, in bytes.
pub const PAGE_SIZE: usize = 0x1000;

/// A mask for extracting the offset within a page from a given address.
pub const PAGE_MASK: usize = 0xfff;

/// Represents a physical address.
///
/// A `Pa` is only ever produced from a value below `0xffff_0000_0000_0000`,
/// which keeps the direct-map translation in [`Pa::into_kva`] from
/// overflowing.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Pa(usize);

impl Pa {
    /// The physical address `0`.
    pub const ZERO: Self = Self(0);

    /// Creates a new physical address if the address is valid.
    ///
    /// # Returns
    /// - `Some(Pa)` if `addr` is below `0xffff_0000_0000_0000`.
    /// - `None` otherwise.
    #[inline]
    pub const fn new(addr: usize) -> Option<Self> {
        if addr < 0xffff_0000_0000_0000 {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// Cast the physical address into a raw `usize`.
    #[inline]
    pub const fn into_usize(self) -> usize {
        self.0
    }

    /// Convert the physical address to the kernel virtual address that maps
    /// it.
    #[inline]
    pub const fn into_kva(self) -> Kva {
        Kva(self.0.wrapping_add(VA_TO_PA_OFF))
    }
}

/// Represents a kernel virtual address.
///
/// Kernel virtual addresses live in the upper half of the canonical address
/// space, i.e. bits 47..63 are all set.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Kva(usize);

impl Kva {
    /// Creates a new kernel virtual address if the address is in the upper
    /// half.
    ///
    /// ```
    /// use abyss::addressing::Kva;
    ///
    /// assert!(Kva::new(0xFFFF_8000_1234_5678).is_some());
    /// assert!(Kva::new(0x1234_5678).is_none());
    /// ```
    #[inline(always)]
    pub const fn new(addr: usize) -> Option<Self> {
        match addr & 0xffff_8000_0000_0000 {
            0xffff_8000_0000_0000 => Some(Self(addr)),
            _ => None,
        }
    }

    /// Returns the raw `usize` representation of the kernel virtual address.
    #[inline]
    pub const fn into_usize(self) -> usize {
        self.0
    }

    /// Converts the kernel virtual address to the physical address it maps.
    ///
    /// Only meaningful for addresses inside the direct map.
    #[inline]
    pub const fn into_pa(self) -> Pa {
        Pa(self.0.wrapping_sub(VA_TO_PA_OFF))
    }
}

/// Represents a canonical virtual address.
///
/// On x86_64 only 48 bits of a virtual address are translated; bits 48..63
/// must be copies of bit 47. Anything else is rejected by [`Va::new`] and can
/// never be mapped.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Va(usize);

impl Va {
    /// Creates a new virtual address if the address is canonical.
    ///
    /// ```
    /// use abyss::addressing::Va;
    ///
    /// assert!(Va::new(0xFFFF_8000_1234_5678).is_some());
    /// assert!(Va::new(0x0000_7fff_ffff_f000).is_some());
    /// assert!(Va::new(0xFFFF_7000_1234_5678).is_none());
    /// ```
    #[inline(always)]
    pub const fn new(addr: usize) -> Option<Self> {
        match addr & 0xffff_8000_0000_0000 {
            m if m == 0xffff_8000_0000_0000 || m == 0 => Some(Self(addr)),
            _ => None,
        }
    }

    /// Returns the raw `usize` representation of the virtual address.
    #[inline]
    pub const fn into_usize(self) -> usize {
        self.0
    }

    /// Aligns the virtual address down to the nearest page boundary.
    #[inline]
    pub const fn page_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// Extracts the offset within the memory page from the virtual address.
    #[inline]
    pub const fn offset(self) -> usize {
        self.0 & PAGE_MASK
    }
}

macro_rules! impl_arith {
    ($t: ty) => {
        impl core::ops::Add<usize> for $t {
            type Output = Self;

            fn add(self, other: usize) -> Self::Output {
                Self(self.0.wrapping_add(other))
            }
        }
        impl core::ops::AddAssign<usize> for $t {
            fn add_assign(&mut self, other: usize) {
                self.0 = self.0.wrapping_add(other)
            }
        }
        impl core::ops::Sub<usize> for $t {
            type Output = Self;

            fn sub(self, other: usize) -> Self::Output {
                Self(self.0.wrapping_sub(other))
            }
        }
        impl core::ops::Sub<Self> for $t {
            type Output = usize;

            fn sub(self, other: Self) -> Self::Output {
                self.0.wrapping_sub(other.0)
            }
        }
        impl core::ops::BitOr<usize> for $t {
            type Output = Self;

            fn bitor(self, other: usize) -> Self {
                Self(self.0 | other)
            }
        }
        impl core::ops::BitAnd<usize> for $t {
            type Output = Self;

            fn bitand(self, other: usize) -> Self {
                Self(self.0 & other)
            }
        }
    };
}

impl_arith!(Kva);
impl_arith!(Va);
impl_arith!(Pa);

macro_rules! impl_fmt {
    ($t: ident) => {
        impl core::fmt::Debug for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!(stringify!($t), "(0x{:x})"), self.0)
            }
        }
        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!(stringify!($t), "(0x{:x})"), self.0)
            }
        }
    };
}

impl_fmt!(Kva);
impl_fmt!(Va);
impl_fmt!(Pa);
