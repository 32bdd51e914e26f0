//! Virtual-to-physical mapping inspection.
//!
//! [`Mappings`] reports, page by page, how a range of virtual addresses is
//! mapped by a page table. It only ever looks entries up through
//! [`PageTableWalk`]; asking about a range never changes the page table.
use crate::mm::page_table::{PageTableMappingError, PageTableWalk, PteFlags};
use crate::util::round_down;
use abyss::addressing::{PAGE_SIZE, Pa, Va};

/// How a present page is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// Physical address of the page frame.
    pub pa: Pa,
    /// The page is accessible from user mode.
    pub user: bool,
    /// The page is writable.
    pub writable: bool,
}

/// One line of the report: a page and its mapping, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRow {
    pub va: usize,
    pub mapping: Option<Mapping>,
}

impl MappingRow {
    /// Looks up the page at `va`, which must be page-aligned.
    ///
    /// Non-canonical addresses and pages without a present leaf entry have no
    /// mapping.
    pub fn inspect<P: PageTableWalk + ?Sized>(page_table: &P, va: usize) -> Self {
        let mapping = Va::new(va)
            .and_then(|addr| match page_table.walk(addr) {
                Ok(pte) => Some(pte),
                Err(PageTableMappingError::BadTable(table)) => {
                    warning!("showmap: table {:?} on the path of {:#x} is unreadable", table, va);
                    None
                }
                Err(_) => None,
            })
            .and_then(|pte| {
                Some(Mapping {
                    pa: pte.pa()?,
                    user: pte.flags().contains(PteFlags::US),
                    writable: pte.flags().contains(PteFlags::RW),
                })
            });
        Self { va, mapping }
    }
}

impl core::fmt::Display for MappingRow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.mapping {
            Some(Mapping { pa, user, writable }) => write!(
                f,
                "VA: 0x{:08x}, PA: 0x{:08x}, U-bit: {}, W-bit: {}",
                self.va,
                pa.into_usize(),
                user as u8,
                writable as u8
            ),
            None => write!(f, "VA: 0x{:08x}, PA: No Mapping", self.va),
        }
    }
}

/// Rows for the pages of `[start, start + pages * PAGE_SIZE)`, ascending.
///
/// Both ends are rounded down to a page boundary, and the end is computed
/// with wrapping arithmetic. A range whose end wraps below its start is
/// therefore empty.
pub struct Mappings<'a, P: PageTableWalk + ?Sized> {
    page_table: &'a P,
    va: usize,
    end: usize,
}

impl<'a, P: PageTableWalk + ?Sized> Mappings<'a, P> {
    pub fn new(page_table: &'a P, start: usize, pages: usize) -> Self {
        let end = start.wrapping_add(pages.wrapping_mul(PAGE_SIZE));
        Self {
            page_table,
            va: round_down(start, PAGE_SIZE),
            end: round_down(end, PAGE_SIZE),
        }
    }
}

impl<P: PageTableWalk + ?Sized> Iterator for Mappings<'_, P> {
    type Item = MappingRow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.va >= self.end {
            return None;
        }
        let row = MappingRow::inspect(self.page_table, self.va);
        // `end` is page-aligned and above `va`, so this cannot overflow.
        self.va += PAGE_SIZE;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end.saturating_sub(self.va) / PAGE_SIZE;
        (n, Some(n))
    }
}

impl<P: PageTableWalk + ?Sized> ExactSizeIterator for Mappings<'_, P> {}

impl<P: PageTableWalk + ?Sized> core::iter::FusedIterator for Mappings<'_, P> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::page_table::testing::FakePhys;
    use alloc::{format, string::String, vec::Vec};
    use core::fmt::Write;

    fn user_page(pa: usize) -> usize {
        pa | (PteFlags::P | PteFlags::RW | PteFlags::US).bits()
    }

    fn render<P: PageTableWalk>(page_table: &P, start: usize, pages: usize) -> String {
        let mut out = String::new();
        for row in Mappings::new(page_table, start, pages) {
            writeln!(out, "{row}").unwrap();
        }
        out
    }

    #[test]
    fn reports_present_and_missing_pages() {
        let mut phys = FakePhys::new(8);
        phys.map(0x0040_0000, user_page(0x0010_0000), 0x2000);
        let pgtbl = phys.table();

        assert_eq!(
            render(&pgtbl, 0x0040_0000, 2),
            "VA: 0x00400000, PA: 0x00100000, U-bit: 1, W-bit: 1\n\
             VA: 0x00401000, PA: No Mapping\n"
        );
    }

    #[test]
    fn bits_follow_the_entry() {
        let mut phys = FakePhys::new(8);
        let next = phys.map(0x0040_0000, 0x0020_0000 | PteFlags::P.bits(), 0x2000);
        phys.map(0x0040_1000, 0x0030_0000 | (PteFlags::P | PteFlags::US).bits(), next);
        // Present bit clear: the frame bits are ignored.
        phys.map(0x0040_2000, 0x0050_0000 | PteFlags::RW.bits(), next);
        let pgtbl = phys.table();

        let rows: Vec<_> = Mappings::new(&pgtbl, 0x0040_0000, 3).collect();
        assert_eq!(
            rows.iter().map(|r| r.mapping).collect::<Vec<_>>(),
            [
                Some(Mapping { pa: Pa::new(0x0020_0000).unwrap(), user: false, writable: false }),
                Some(Mapping { pa: Pa::new(0x0030_0000).unwrap(), user: true, writable: false }),
                None,
            ]
        );
    }

    #[test]
    fn one_row_per_page_ascending() {
        let phys = FakePhys::new(2);
        let pgtbl = phys.table();

        let rows = Mappings::new(&pgtbl, 0x1000_0000, 5);
        assert_eq!(rows.len(), 5);
        let vas: Vec<_> = rows.map(|r| r.va).collect();
        assert_eq!(vas, [0x1000_0000, 0x1000_1000, 0x1000_2000, 0x1000_3000, 0x1000_4000]);
        assert_eq!(Mappings::new(&pgtbl, 0x1000_0000, 0).count(), 0);
    }

    #[test]
    fn unaligned_start_is_rounded_down() {
        let phys = FakePhys::new(2);
        let pgtbl = phys.table();

        // [0x1234, 0x2234) rounds to [0x1000, 0x2000).
        let vas: Vec<_> = Mappings::new(&pgtbl, 0x1234, 1).map(|r| r.va).collect();
        assert_eq!(vas, [0x1000]);
    }

    #[test]
    fn non_canonical_pages_have_no_mapping() {
        let phys = FakePhys::new(2);
        let pgtbl = phys.table();

        let row = MappingRow::inspect(&pgtbl, 0x0000_8000_0000_0000);
        assert_eq!(row.mapping, None);
        assert_eq!(format!("{row}"), "VA: 0x800000000000, PA: No Mapping");
    }

    #[test]
    fn ranges_past_the_top_are_empty() {
        let phys = FakePhys::new(2);
        let pgtbl = phys.table();

        assert_eq!(Mappings::new(&pgtbl, 0xffff_ffff_ffff_f000, 2).count(), 0);
        assert_eq!(Mappings::new(&pgtbl, 0xffff_ffff_ffff_e000, 1).count(), 1);
    }

    #[test]
    fn inspection_is_idempotent() {
        let mut phys = FakePhys::new(8);
        phys.map(0x0040_0000, user_page(0x0010_0000), 0x2000);
        let before = phys.0.clone();
        let pgtbl = phys.table();

        let first = render(&pgtbl, 0x0040_0000, 4);
        let second = render(&pgtbl, 0x0040_0000, 4);
        assert_eq!(first, second);
        assert_eq!(phys.0, before);
    }
}
