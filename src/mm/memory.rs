//! Read-only views over memory.
//!
//! The monitor never dereferences an address it computed. Every read goes
//! through a [`MemoryView`], a byte slice paired with the virtual address of
//! its first byte. A read outside the slice yields `None` instead of touching
//! memory, which is what makes it safe to follow frame pointers and
//! page-table entries that may be garbage.
//!
//! On the live kernel a view wraps the current thread stack, or the direct
//! map of physical memory. In tests it wraps an ordinary buffer that stands
//! in for either one, with whatever base address the test likes.
use abyss::addressing::Pa;

/// Size of a machine word, in bytes.
pub const WORD_SIZE: usize = core::mem::size_of::<usize>();

/// A bounds-checked, read-only view of `bytes`, which are mapped at virtual
/// address `base`.
#[derive(Clone, Copy)]
pub struct MemoryView<'a> {
    base: usize,
    bytes: &'a [u8],
}

impl<'a> MemoryView<'a> {
    /// Creates a view of `bytes` as if they were mapped at `base`.
    pub const fn new(base: usize, bytes: &'a [u8]) -> Self {
        Self { base, bytes }
    }

    /// Creates a view of the `len` bytes that are mapped at `base`.
    ///
    /// # Safety
    /// `base..base + len` must be mapped and readable for `'a`.
    pub unsafe fn from_raw(base: usize, len: usize) -> Self {
        Self {
            base,
            bytes: unsafe { core::slice::from_raw_parts(base as *const u8, len) },
        }
    }

    /// Virtual address of the first byte of the view.
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Number of bytes covered by the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the view covers no byte.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns true if every byte of `addr..addr + len` is inside the view.
    pub fn contains(&self, addr: usize, len: usize) -> bool {
        self.range(addr, len).is_some()
    }

    fn range(&self, addr: usize, len: usize) -> Option<core::ops::Range<usize>> {
        let start = addr.checked_sub(self.base)?;
        let end = start.checked_add(len)?;
        (end <= self.bytes.len()).then_some(start..end)
    }

    /// Reads `N` bytes at `addr`.
    pub fn read_bytes<const N: usize>(&self, addr: usize) -> Option<[u8; N]> {
        self.bytes.get(self.range(addr, N)?)?.try_into().ok()
    }

    /// Reads the native-endian machine word at `addr`.
    ///
    /// `addr` need not be aligned.
    #[inline]
    pub fn read_word(&self, addr: usize) -> Option<usize> {
        self.read_bytes::<WORD_SIZE>(addr).map(usize::from_ne_bytes)
    }
}

impl core::fmt::Debug for MemoryView<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "MemoryView(0x{:x}..0x{:x})",
            self.base,
            self.base.wrapping_add(self.bytes.len())
        )
    }
}

/// Physical memory, seen through the kernel's direct map.
///
/// `view` must be the window that starts at [`Pa::ZERO`]`.into_kva()`; a
/// physical address is translated with [`Pa::into_kva`] and read through it.
#[derive(Clone, Copy, Debug)]
pub struct PhysicalMemory<'a> {
    view: MemoryView<'a>,
}

impl<'a> PhysicalMemory<'a> {
    /// Wraps the first `bytes.len()` bytes of physical memory.
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self {
            view: MemoryView::new(Pa::ZERO.into_kva().into_usize(), bytes),
        }
    }

    /// Wraps the first `size` bytes of physical memory through the live
    /// direct map.
    ///
    /// # Safety
    /// The direct map must cover `0..size` of physical memory for `'a`.
    pub unsafe fn direct_map(size: usize) -> Self {
        Self {
            view: unsafe { MemoryView::from_raw(Pa::ZERO.into_kva().into_usize(), size) },
        }
    }

    /// Reads the word at physical address `pa`.
    #[inline]
    pub fn read_word(&self, pa: Pa) -> Option<usize> {
        self.view.read_word(pa.into_kva().into_usize())
    }

    /// Number of bytes of physical memory covered.
    pub fn size(&self) -> usize {
        self.view.len()
    }
}
