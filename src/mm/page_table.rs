//! Entries of Page Table and their permissions.
//!
//! x86_64 translates a canonical virtual address through four tables:
//!
//! ```text
//! 63          48 47            39 38            30 29            21 20         12 11         0
//! +-------------+----------------+----------------+----------------+-------------+------------+
//! | Sign Extend |    Page-Map    | Page-Directory | Page-directory |  Page-Table |    Page    |
//! |             | Level-4 Offset |    Pointer     |     Offset     |   Offset    |   Offset   |
//! +-------------+----------------+----------------+----------------+-------------+------------+
//!               |                |                |                |             |            |
//!               +------- 9 ------+------- 9 ------+------- 9 ------+----- 9 -----+---- 12 ----+
//! ```
//!
//! The first three levels hold [`DirectoryEntry`]s that point at the next
//! table, or directly at a 1 GiB / 2 MiB page when the `PS` bit is set. The
//! last level holds [`Pte`]s that map a 4 KiB page.
//!
//! The monitor only ever *reads* page tables. [`PageTableWalk::walk`] takes
//! `&self` and hands back a copy of the leaf entry, so a caller holding a
//! walker has no way to allocate or modify a table.
use crate::mm::memory::{PhysicalMemory, WORD_SIZE};
use abyss::addressing::{PAGE_MASK, Pa, Va};

/// Bits 12..51 of an entry: the physical frame it points to.
pub const ENTRY_ADDR_MASK: usize = 0x000f_ffff_ffff_f000;

/// Number of entries in one table.
pub const ENTRIES_PER_TABLE: usize = 512;

/// Size of the page mapped by a `PS` entry in the page directory.
pub const LARGE_PAGE_SIZE: usize = 1 << 21;

/// Size of the page mapped by a `PS` entry in the page directory pointer
/// table.
pub const HUGE_PAGE_SIZE: usize = 1 << 30;

bitflags::bitflags! {
    /// Flags for pte.
    pub struct PteFlags: usize {
        /// Present; must be 1 to map a 4-KByte page
        const P = 1 << 0;
        /// Read/write; if 0, writes may not be allowed to the 4-KByte page referenced by this entry
        const RW = 1 << 1;
        /// User/supervisor; if 0, user-mode accesses are not allowed to the 4-KByte page referenced by this entry
        const US = 1 << 2;
        /// Page-level write-through
        const PWT = 1 << 3;
        /// Page-level cache disable
        const PCD = 1 << 4;
        /// Accessed; indicates whether software has accessed the 4-KByte page referenced by this entry
        const A = 1 << 5;
        /// Dirty; indicates whether software has written to the 4-KByte page referenced by this entry
        const D = 1 << 6;
        /// Indirectly determines the memory type used to access the 4-KByte page referenced by this entry
        const PAT = 1 << 7;
        /// Global; if CR4.PGE = 1, determines whether the translation is global
        const G = 1 << 8;
        /// If IA32_EFER.NXE = 1, execute-disable
        const XD = 1 << 63;
    }
}

bitflags::bitflags! {
    /// Flags for the entries of the three upper levels (pml4e, pdpe, pde).
    pub struct DirectoryFlags: usize {
        /// Present; must be 1 to reference the next level or map a large page
        const P = 1 << 0;
        /// Read/write; if 0, writes may not be allowed to the region controlled by this entry
        const RW = 1 << 1;
        /// User/supervisor; if 0, user-mode accesses are not allowed to the region controlled by this entry
        const US = 1 << 2;
        /// Page-level write-through
        const PWT = 1 << 3;
        /// Page-level cache disable
        const PCD = 1 << 4;
        /// Accessed
        const A = 1 << 5;
        /// Dirty; only meaningful when `PS` is set
        const D = 1 << 6;
        /// Page size; if 1, the entry maps a 1-GByte (pdpe) or 2-MByte (pde) page.
        /// Reserved in a pml4e.
        const PS = 1 << 7;
        /// Global; only meaningful when `PS` is set
        const G = 1 << 8;
        /// If IA32_EFER.NXE = 1, execute-disable
        const XD = 1 << 63;
    }
}

/// Page Table Entry (PTE).
///
/// The leaf of the walk: maps one 4 KiB page.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pte(pub usize);

impl core::fmt::Debug for Pte {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(pa) = self.pa() {
            write!(f, "Pte({:016x}, {:?})", pa.into_usize(), self.flags())
        } else {
            write!(f, ".")
        }
    }
}

impl Pte {
    /// Get the physical address of the page mapped by this entry.
    ///
    /// # Returns
    /// - `Some(Pa)` if the entry is present: the frame bits with the flag and
    ///   page-offset bits cleared.
    /// - `None` if the "P" flag is not set.
    #[inline]
    pub const fn pa(&self) -> Option<Pa> {
        if self.flags().contains(PteFlags::P) {
            Pa::new(self.0 & ENTRY_ADDR_MASK)
        } else {
            None
        }
    }

    /// Get the flags associated with this entry.
    #[inline]
    pub const fn flags(&self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }
}

/// An entry of the page map level 4, page directory pointer, or page
/// directory table.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct DirectoryEntry(pub usize);

impl core::fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(pa) = self.pa() {
            write!(f, "DirectoryEntry({:016x}, {:?})", pa.into_usize(), self.flags())
        } else {
            write!(f, ".")
        }
    }
}

impl DirectoryEntry {
    /// Get the physical address this entry points to: the next table, or the
    /// base of a large page.
    #[inline]
    pub const fn pa(&self) -> Option<Pa> {
        if self.flags().contains(DirectoryFlags::P) {
            Pa::new(self.0 & ENTRY_ADDR_MASK)
        } else {
            None
        }
    }

    /// Get the flags associated with this entry.
    #[inline]
    pub const fn flags(&self) -> DirectoryFlags {
        DirectoryFlags::from_bits_truncate(self.0)
    }

    /// Returns true if this entry is present and maps a large page directly.
    #[inline]
    pub const fn is_large(&self) -> bool {
        self.flags().contains(DirectoryFlags::P) && self.flags().contains(DirectoryFlags::PS)
    }

    /// Builds the 4 KiB view of the large page of `size` bytes mapped by this
    /// entry, for the page containing `va`.
    ///
    /// The frame is the large page's base plus the offset of `va`'s page in
    /// it; the attributes are carried over, except `PS` which means `PAT` in a
    /// [`Pte`].
    fn split(&self, va: Va, size: usize) -> Pte {
        const CARRIED: usize = PteFlags::P.bits()
            | PteFlags::RW.bits()
            | PteFlags::US.bits()
            | PteFlags::PWT.bits()
            | PteFlags::PCD.bits()
            | PteFlags::A.bits()
            | PteFlags::D.bits()
            | PteFlags::G.bits()
            | PteFlags::XD.bits();
        let base = self.0 & ENTRY_ADDR_MASK & !(size - 1);
        let frame = base | (va.into_usize() & (size - 1) & !PAGE_MASK);
        Pte(frame | (self.0 & CARRIED))
    }
}

/// Page Table Mapping Error.
#[derive(Debug, PartialEq, Eq)]
pub enum PageTableMappingError {
    /// Unaligned address.
    ///
    /// The virtual address handed to the walker is not page-aligned.
    Unaligned,

    /// Not exist.
    ///
    /// An intermediate table on the path to the leaf is not present.
    NotExist,

    /// A table on the path lies outside the physical memory the walker can
    /// read, i.e. the entry pointing at it is corrupted.
    BadTable(Pa),
}

/// Represents page table indices for a given virtual address (VA).
pub struct PtIndices {
    /// The virtual address (VA) associated with this page table index
    /// breakdown.
    pub va: Va,

    /// Page Map Level 4 Index (PML4EI).
    pub pml4ei: usize,

    /// Page Directory Pointer table Index (PDPTEI).
    pub pdptei: usize,

    /// Page Directory Index (PDEI).
    pub pdei: usize,

    /// Page Table Index (PTEI).
    pub ptei: usize,
}

impl PtIndices {
    /// Extracts page table indices from a given virtual address ([`Va`]).
    ///
    /// # Returns
    /// - `Ok(Self)`: If `va` is page-aligned (i.e., lower 12 bits are zero).
    /// - `Err(PageTableMappingError::Unaligned)`: If `va` is not page-aligned.
    pub fn from_va(va: Va) -> Result<Self, PageTableMappingError> {
        if va.offset() == 0 {
            let addr = va.into_usize();
            Ok(Self {
                va,
                pml4ei: (addr >> 39) & (ENTRIES_PER_TABLE - 1),
                pdptei: (addr >> 30) & (ENTRIES_PER_TABLE - 1),
                pdei: (addr >> 21) & (ENTRIES_PER_TABLE - 1),
                ptei: (addr >> 12) & (ENTRIES_PER_TABLE - 1),
            })
        } else {
            Err(PageTableMappingError::Unaligned)
        }
    }
}

/// Finding the leaf entry that maps a virtual address.
///
/// This is the lookup the monitor consumes. It never creates missing tables:
/// a page whose path is incomplete is reported as
/// [`PageTableMappingError::NotExist`].
pub trait PageTableWalk {
    /// Walks the tables for the page-aligned `va`.
    ///
    /// # Returns
    /// - `Ok(Pte)`: a copy of the leaf entry. The entry itself may be
    ///   non-present; callers check [`PteFlags::P`].
    /// - `Err(PageTableMappingError::NotExist)`: an intermediate level is
    ///   missing.
    /// - `Err(PageTableMappingError::Unaligned)`: `va` is not page-aligned.
    fn walk(&self, va: Va) -> Result<Pte, PageTableMappingError>;
}

/// A 4-level page table rooted at the physical address `root`, read through
/// `phys`.
#[derive(Clone, Copy, Debug)]
pub struct PageTable<'a> {
    root: Pa,
    phys: PhysicalMemory<'a>,
}

impl<'a> PageTable<'a> {
    /// Creates a walker over the page table whose PML4 is at `root`.
    pub fn new(root: Pa, phys: PhysicalMemory<'a>) -> Self {
        Self { root, phys }
    }

    /// Physical address of the PML4.
    pub fn root(&self) -> Pa {
        self.root
    }

    #[inline]
    fn entry(&self, table: Pa, index: usize) -> Result<usize, PageTableMappingError> {
        self.phys
            .read_word(table + index * WORD_SIZE)
            .ok_or(PageTableMappingError::BadTable(table))
    }

    #[inline]
    fn next(&self, table: Pa, index: usize) -> Result<DirectoryEntry, PageTableMappingError> {
        self.entry(table, index).map(DirectoryEntry)
    }
}

impl PageTableWalk for PageTable<'_> {
    fn walk(&self, va: Va) -> Result<Pte, PageTableMappingError> {
        let indices = PtIndices::from_va(va)?;

        let pml4e = self.next(self.root, indices.pml4ei)?;
        let pdp = pml4e.pa().ok_or(PageTableMappingError::NotExist)?;

        let pdpe = self.next(pdp, indices.pdptei)?;
        if pdpe.is_large() {
            return Ok(pdpe.split(va, HUGE_PAGE_SIZE));
        }
        let pd = pdpe.pa().ok_or(PageTableMappingError::NotExist)?;

        let pde = self.next(pd, indices.pdei)?;
        if pde.is_large() {
            return Ok(pde.split(va, LARGE_PAGE_SIZE));
        }
        let pt = pde.pa().ok_or(PageTableMappingError::NotExist)?;

        self.entry(pt, indices.ptei).map(Pte)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn va(addr: usize) -> Va {
        Va::new(addr).unwrap()
    }

    #[test]
    fn indices() {
        let idx = PtIndices::from_va(va(0xffff_8000_4060_3000)).unwrap();
        assert_eq!(idx.pml4ei, 256);
        assert_eq!(idx.pdptei, 1);
        assert_eq!(idx.pdei, 3);
        assert_eq!(idx.ptei, 3);

        assert!(matches!(
            PtIndices::from_va(va(0x1234)),
            Err(PageTableMappingError::Unaligned)
        ));
    }

    #[test]
    fn walk_finds_a_4k_mapping() {
        let mut phys = FakePhys::new(8);
        let entry = 0x0010_0000 | (PteFlags::P | PteFlags::RW | PteFlags::US).bits();
        phys.map(0x0040_0000, entry, 0x2000);
        let pgtbl = phys.table();

        let pte = pgtbl.walk(va(0x0040_0000)).unwrap();
        assert_eq!(pte.pa(), Pa::new(0x0010_0000));
        assert_eq!(pte.flags(), PteFlags::P | PteFlags::RW | PteFlags::US);
    }

    #[test]
    fn walk_returns_the_non_present_leaf_slot() {
        let mut phys = FakePhys::new(8);
        phys.map(0x0040_0000, 0x0010_0000 | PteFlags::P.bits(), 0x2000);
        let pgtbl = phys.table();

        // Same page table, neighbouring slot.
        let pte = pgtbl.walk(va(0x0040_1000)).unwrap();
        assert_eq!(pte, Pte(0));
        assert_eq!(pte.pa(), None);
    }

    #[test]
    fn walk_stops_at_missing_levels() {
        let mut phys = FakePhys::new(8);
        phys.map(0x0040_0000, 0x0010_0000 | PteFlags::P.bits(), 0x2000);
        let pgtbl = phys.table();

        // Different page directory pointer entry.
        assert_eq!(
            pgtbl.walk(va(0x4000_0000)),
            Err(PageTableMappingError::NotExist)
        );
        // Different pml4 entry.
        assert_eq!(
            pgtbl.walk(va(0xffff_8000_0000_0000)),
            Err(PageTableMappingError::NotExist)
        );
        assert_eq!(
            pgtbl.walk(va(0x0040_0010)),
            Err(PageTableMappingError::Unaligned)
        );
    }

    #[test]
    fn walk_splits_large_pages() {
        let mut phys = FakePhys::new(4);
        // pml4[0] -> pdp at 0x2000, pdp[0] -> pd at 0x3000.
        phys.set(ROOT, 0, 0x2000 | INTERMEDIATE);
        phys.set(0x2000, 0, 0x3000 | INTERMEDIATE);
        // pd[1]: 2 MiB page at 0x4000_0000, writable, kernel only.
        let large = 0x4000_0000 | (DirectoryFlags::P | DirectoryFlags::RW | DirectoryFlags::PS).bits();
        phys.set(0x3000, 1, large);
        // pdp[1]: 1 GiB page at 0x8000_0000, read-only, user.
        let huge = 0x8000_0000 | (DirectoryFlags::P | DirectoryFlags::US | DirectoryFlags::PS).bits();
        phys.set(0x2000, 1, huge);
        let pgtbl = phys.table();

        let pte = pgtbl.walk(va(0x0020_5000)).unwrap();
        assert_eq!(pte.pa(), Pa::new(0x4000_5000));
        assert_eq!(pte.flags(), PteFlags::P | PteFlags::RW);

        let pte = pgtbl.walk(va(0x4012_3000)).unwrap();
        assert_eq!(pte.pa(), Pa::new(0x8012_3000));
        assert_eq!(pte.flags(), PteFlags::P | PteFlags::US);
    }

    #[test]
    fn corrupted_entries_do_not_escape_physical_memory() {
        let mut phys = FakePhys::new(2);
        phys.set(ROOT, 0, 0x7fff_f000 | INTERMEDIATE);
        let pgtbl = phys.table();

        assert_eq!(
            pgtbl.walk(va(0x1000)),
            Err(PageTableMappingError::BadTable(Pa::new(0x7fff_f000).unwrap()))
        );
    }
}
