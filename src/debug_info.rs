//! Resolving instruction addresses to source locations.
//!
//! The monitor asks one question about code: "which function does this return
//! address belong to, and where is it in the source?". The [`DebugInfo`] trait
//! is that question; [`KernelDebugInfo`] answers it from the kernel's own ELF
//! image, using the symbol table for function names and the DWARF line
//! program for file and line.
use alloc::{
    borrow::Cow,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use addr2line::Context;

/// Function names longer than this are cut when reported.
pub const MAX_FN_NAME_LEN: usize = 128;

/// File name reported when no line information covers an address.
pub const UNKNOWN_FILE: &str = "<unknown>";

/// Resolved identity of an instruction address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugLocation<'a> {
    /// Source file of the instruction.
    pub file: &'a str,
    /// Line in `file`, 0 when unknown.
    pub line: u32,
    /// Name of the enclosing function, at most [`MAX_FN_NAME_LEN`] bytes.
    pub function: &'a str,
    /// Address of the first instruction of the enclosing function.
    pub function_start: usize,
}

impl DebugLocation<'_> {
    /// Distance of `pc` from the start of the enclosing function.
    #[inline]
    pub fn offset(&self, pc: usize) -> usize {
        pc.wrapping_sub(self.function_start)
    }
}

/// A source of debugging information for code addresses.
pub trait DebugInfo {
    /// Resolves `pc`.
    ///
    /// # Returns
    /// - `Some(DebugLocation)` if `pc` lies inside a known function.
    /// - `None` otherwise. Callers treat this as "not code".
    fn resolve(&self, pc: usize) -> Option<DebugLocation<'_>>;
}

/// Cuts `name` to at most [`MAX_FN_NAME_LEN`] bytes without splitting a
/// character.
pub fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_FN_NAME_LEN {
        return name;
    }
    let mut end = MAX_FN_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// A function symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Address of the first instruction.
    pub start: usize,
    /// Size in bytes. A zero-sized symbol covers its start address only.
    pub size: usize,
    /// Demangled name.
    pub name: String,
}

impl Symbol {
    fn contains(&self, pc: usize) -> bool {
        pc.wrapping_sub(self.start) < self.size.max(1)
    }
}

/// Function symbols sorted by start address.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Builds a table from `symbols` in any order.
    pub fn new(mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by_key(|s| s.start);
        Self { symbols }
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if the table has no symbol.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Finds the symbol enclosing `pc`.
    ///
    /// Among symbols starting at or below `pc`, the closest one wins; nested
    /// or aliased symbols therefore resolve to the innermost start.
    pub fn lookup(&self, pc: usize) -> Option<&Symbol> {
        let idx = self.symbols.partition_point(|s| s.start <= pc);
        self.symbols[..idx].iter().rev().find(|s| s.contains(pc))
    }
}

/// Errors while loading debugging information.
#[derive(Debug)]
pub enum DebugInfoError {
    /// The image is not an object file this build understands.
    ImageFormat(object::Error),
    /// The DWARF sections are malformed.
    Dwarf(gimli::Error),
}

impl core::fmt::Display for DebugInfoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ImageFormat(e) => write!(f, "bad kernel image: {e}"),
            Self::Dwarf(e) => write!(f, "bad DWARF: {e}"),
        }
    }
}

type Reader = gimli::EndianArcSlice<gimli::LittleEndian>;

/// Debugging information of the running kernel.
pub struct KernelDebugInfo {
    symbols: SymbolTable,
    lines: Context<Reader>,
}

impl KernelDebugInfo {
    /// Loads the debugging information from the kernel ELF `image`.
    ///
    /// Only text symbols are kept. Their names are demangled once here.
    pub fn load(image: &[u8]) -> Result<Self, DebugInfoError> {
        use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};

        let kernel = object::File::parse(image).map_err(DebugInfoError::ImageFormat)?;

        let symbols = kernel
            .symbols()
            .filter(|sym| sym.kind() == SymbolKind::Text && sym.address() != 0)
            .filter_map(|sym| {
                let name = sym.name().ok()?;
                Some(Symbol {
                    start: sym.address() as usize,
                    size: sym.size() as usize,
                    name: addr2line::demangle_auto(Cow::Borrowed(name), None).to_string(),
                })
            })
            .collect();
        let symbols = SymbolTable::new(symbols);

        let dwarf = gimli::Dwarf::load(|id| -> Result<_, gimli::Error> {
            let data = kernel
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .unwrap_or(Cow::Borrowed(&[]));
            let data: Arc<[u8]> = Arc::from(data.as_ref());
            Ok(gimli::EndianArcSlice::new(data, gimli::LittleEndian))
        })
        .map_err(DebugInfoError::Dwarf)?;
        let lines = Context::from_dwarf(dwarf).map_err(DebugInfoError::Dwarf)?;

        info!("debug info: {} function symbols", symbols.len());
        if symbols.is_empty() {
            warning!("kernel image has no function symbols; backtraces will be empty");
        }
        Ok(Self { symbols, lines })
    }

    /// The function symbols of the kernel.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
}

impl DebugInfo for KernelDebugInfo {
    fn resolve(&self, pc: usize) -> Option<DebugLocation<'_>> {
        let symbol = self.symbols.lookup(pc)?;
        let location = self.lines.find_location(pc as u64).ok().flatten();
        Some(DebugLocation {
            file: location.as_ref().and_then(|l| l.file).unwrap_or(UNKNOWN_FILE),
            line: location.as_ref().and_then(|l| l.line).unwrap_or(0),
            function: truncate_name(&symbol.name),
            function_start: symbol.start,
        })
    }
}

impl DebugInfo for SymbolTable {
    fn resolve(&self, pc: usize) -> Option<DebugLocation<'_>> {
        self.lookup(pc).map(|symbol| DebugLocation {
            file: UNKNOWN_FILE,
            line: 0,
            function: truncate_name(&symbol.name),
            function_start: symbol.start,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sym(start: usize, size: usize, name: &str) -> Symbol {
        Symbol {
            start,
            size,
            name: name.to_string(),
        }
    }

    #[test]
    fn lookup_by_containment() {
        let table = SymbolTable::new(vec![
            sym(0x3000, 0x100, "kmon::c"),
            sym(0x1000, 0x80, "kmon::a"),
            sym(0x2000, 0, "kmon::b"),
        ]);

        assert_eq!(table.lookup(0x1000).map(|s| s.name.as_str()), Some("kmon::a"));
        assert_eq!(table.lookup(0x107f).map(|s| s.name.as_str()), Some("kmon::a"));
        // Gap between a and b.
        assert_eq!(table.lookup(0x1080), None);
        assert_eq!(table.lookup(0x2000).map(|s| s.name.as_str()), Some("kmon::b"));
        assert_eq!(table.lookup(0x2001), None);
        assert_eq!(table.lookup(0x30ff).map(|s| s.name.as_str()), Some("kmon::c"));
        assert_eq!(table.lookup(0x3100), None);
        assert_eq!(table.lookup(0xfff), None);
    }

    #[test]
    fn nested_symbols_resolve_to_the_closest_start() {
        let table = SymbolTable::new(vec![
            sym(0x1000, 0x1000, "outer"),
            sym(0x1400, 0x10, "inner"),
        ]);
        assert_eq!(table.lookup(0x1408).map(|s| s.name.as_str()), Some("inner"));
        // Past the inner symbol, the outer one still covers the address.
        assert_eq!(table.lookup(0x1500).map(|s| s.name.as_str()), Some("outer"));
    }

    #[test]
    fn symbol_table_resolves_without_line_info() {
        let table = SymbolTable::new(vec![sym(0x1000, 0x80, "kmon::a")]);
        let loc = table.resolve(0x1010).unwrap();
        assert_eq!(loc.file, UNKNOWN_FILE);
        assert_eq!(loc.line, 0);
        assert_eq!(loc.function, "kmon::a");
        assert_eq!(loc.offset(0x1010), 0x10);
    }

    #[test]
    fn long_names_are_truncated_on_char_boundaries() {
        let short = "kmon::backtrace::Backtrace::new";
        assert_eq!(truncate_name(short), short);

        let long = "a".repeat(MAX_FN_NAME_LEN + 10);
        assert_eq!(truncate_name(&long).len(), MAX_FN_NAME_LEN);

        // A two-byte character straddling the cut is dropped whole.
        let mut straddling = "b".repeat(MAX_FN_NAME_LEN - 1);
        straddling.push('é');
        let cut = truncate_name(&straddling);
        assert_eq!(cut.len(), MAX_FN_NAME_LEN - 1);
        assert!(cut.chars().all(|c| c == 'b'));
    }

    #[test]
    fn garbage_is_not_a_kernel_image() {
        assert!(matches!(
            KernelDebugInfo::load(b"definitely not an ELF file"),
            Err(DebugInfoError::ImageFormat(_))
        ));
    }
}
