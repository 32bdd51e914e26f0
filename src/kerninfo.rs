//! Where the kernel image lives.
use abyss::addressing::Kva;
use core::fmt::Write;

/// Addresses of the special symbols delimiting the kernel image.
///
/// On the live kernel they come from the linker; see `kernel::layout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelLayout {
    /// `_start`: the entry point the boot loader jumps to.
    pub start: usize,
    /// `entry`: first byte of the image.
    pub entry: usize,
    /// `etext`: end of code.
    pub etext: usize,
    /// `edata`: end of initialized data.
    pub edata: usize,
    /// `end`: end of the image, bss included.
    pub end: usize,
}

/// Physical address of a kernel symbol. Addresses outside the direct map are
/// identity mapped.
fn phys(addr: usize) -> usize {
    Kva::new(addr).map_or(addr, |kva| kva.into_pa().into_usize())
}

impl KernelLayout {
    /// Memory taken by the image, in KiB, rounded up.
    pub fn footprint_kb(&self) -> usize {
        self.end.saturating_sub(self.entry).div_ceil(1024)
    }

    /// Writes the symbol table and the footprint to `w`.
    pub fn report(&self, w: &mut dyn Write) -> core::fmt::Result {
        writeln!(w, "Special kernel symbols:")?;
        writeln!(w, "  _start                  {:016x} (phys)", phys(self.start))?;
        for (name, addr) in [
            ("entry", self.entry),
            ("etext", self.etext),
            ("edata", self.edata),
            ("end", self.end),
        ] {
            writeln!(w, "  {name:<6} {addr:016x} (virt)  {:016x} (phys)", phys(addr))?;
        }
        writeln!(w, "Kernel executable memory footprint: {}KB", self.footprint_kb())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abyss::addressing::Pa;
    use alloc::string::String;

    fn layout() -> KernelLayout {
        let base = Pa::new(0x0010_0000).unwrap().into_kva().into_usize();
        KernelLayout {
            start: 0x0010_000c,
            entry: base,
            etext: base + 0x1_2345,
            edata: base + 0x2_0000,
            end: base + 0x2_0001,
        }
    }

    #[test]
    fn footprint_rounds_up() {
        assert_eq!(layout().footprint_kb(), 129);
    }

    #[test]
    fn report_lists_virtual_and_physical_addresses() {
        let mut out = String::new();
        layout().report(&mut out).unwrap();

        let lines: alloc::vec::Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "Special kernel symbols:");
        assert_eq!(lines[1], "  _start                  000000000010000c (phys)");
        assert!(lines[2].starts_with("  entry  ffff"));
        assert!(lines[2].ends_with("(virt)  0000000000100000 (phys)"));
        assert!(lines[3].ends_with("0000000000112345 (phys)"));
        assert!(lines[5].starts_with("  end    "));
        assert_eq!(lines[6], "Kernel executable memory footprint: 129KB");
    }
}
