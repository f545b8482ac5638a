//! The source-level locator: parses the debuggee executable once at
//! startup and answers address<->(file,line) and symbol->address
//! queries, with prologue-skipping so a breakpoint set on a function
//! enters after its stack/frame setup.
//!
//! The DWARF/ELF parsing (via `gimli`/`goblin`) is kept separate from the
//! prologue-scanning algorithm itself, which operates on a plain
//! `Vec<LineRow>` per compile unit — this is what makes the algorithm
//! unit-testable without a real binary on disk.

use crate::error::LocatorError;
use gimli::{EndianSlice, LittleEndian, Reader};
use goblin::elf::Elf;
use std::collections::HashMap;
use std::path::Path;

/// One row of a DWARF line program: an instruction address and the
/// source coordinate it maps to, plus the `prologue_end` marker the
/// prologue-skipping algorithm depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRow {
    pub address: u64,
    pub file: String,
    pub line: u64,
    pub prologue_end: bool,
}

#[derive(Debug, Clone)]
struct FunctionSymbol {
    name: String,
    entry: u64,
}

/// Failure modes of [`Locator::func_to_addr`], kept distinct from
/// [`LocatorError`] (which covers construction-time failures) so the
/// caller can render `SymbolNotFound`/`PrologueNotFound` messages with
/// the symbol name it already has in hand.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FuncLookupError {
    SymbolNotFound,
    PrologueNotFound,
}

pub struct Locator {
    functions: Vec<FunctionSymbol>,
    /// One Vec per compile unit, in line-program row order, exactly as
    /// emitted by the DWARF line program — this ordering is what the
    /// prologue-end scan depends on.
    compile_units: Vec<Vec<LineRow>>,
    /// All rows from every compile unit, sorted by address, for
    /// PCToFileLine lookups.
    pc_index: Vec<LineRow>,
    /// (file, line) -> smallest matching address, for FileLineToAddr.
    file_line_index: HashMap<(String, u64), u64>,
}

impl Locator {
    /// Parses `path` once, extracting the symbol table, PC->line table,
    /// and DWARF line records needed for prologue analysis. Fails with a
    /// distinct [`LocatorError`] if a required section is missing or
    /// malformed; the executable's file handle is not retained past this
    /// call.
    pub fn new(path: &Path) -> Result<Locator, LocatorError> {
        let data = std::fs::read(path).map_err(|source| LocatorError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&data)
    }

    fn from_bytes(data: &[u8]) -> Result<Locator, LocatorError> {
        let elf = Elf::parse(data)?;

        if section_data(&elf, data, ".text").is_none() {
            return Err(LocatorError::MissingSection(".text"));
        }

        let functions = parse_function_symbols(&elf);

        let endian = LittleEndian;
        let load_section = |id: gimli::SectionId| -> Result<EndianSlice<LittleEndian>, gimli::Error> {
            let bytes = section_data(&elf, data, id.name()).unwrap_or(&[]);
            Ok(EndianSlice::new(bytes, endian))
        };
        let dwarf = gimli::Dwarf::load(load_section)?;

        let compile_units = parse_compile_units(&dwarf)?;

        let mut pc_index: Vec<LineRow> = compile_units.iter().flatten().cloned().collect();
        pc_index.sort_by_key(|r| r.address);

        let mut file_line_index: HashMap<(String, u64), u64> = HashMap::new();
        for row in &pc_index {
            if row.line == 0 {
                continue;
            }
            let key = (row.file.clone(), row.line);
            file_line_index
                .entry(key)
                .and_modify(|addr| *addr = (*addr).min(row.address))
                .or_insert(row.address);
        }

        Ok(Locator {
            functions,
            compile_units,
            pc_index,
            file_line_index,
        })
    }

    /// Looks up the source coordinates for `pc`. Never fails: an
    /// uncovered address yields an empty file and line zero, which
    /// callers treat as "suppress rendering".
    pub fn pc_to_file_line(&self, pc: u64) -> (String, u64) {
        match self.pc_index.partition_point(|r| r.address <= pc) {
            0 => (String::new(), 0),
            idx => {
                let row = &self.pc_index[idx - 1];
                (row.file.clone(), row.line)
            }
        }
    }

    /// Resolves a function symbol to its prologue-end address. Fails
    /// with `SymbolNotFound` if the symbol is absent, or
    /// `PrologueNotFound` if no `prologue_end` line record exists after
    /// the entry.
    pub fn func_to_addr(&self, symbol: &str) -> Result<u64, FuncLookupError> {
        let func = self
            .functions
            .iter()
            .find(|f| f.name == symbol)
            .ok_or(FuncLookupError::SymbolNotFound)?;
        find_prologue_end_across_cus(&self.compile_units, func.entry)
            .ok_or(FuncLookupError::PrologueNotFound)
    }

    /// Resolves a (file, line) coordinate to an instruction address,
    /// redirecting to the prologue-end address when the mapped address is
    /// a function's entry point.
    pub fn file_line_to_addr(&self, file: &str, line: u64) -> Option<u64> {
        let addr = *self.file_line_index.get(&(file.to_string(), line))?;
        if let Some(func) = self.functions.iter().find(|f| f.entry == addr) {
            find_prologue_end_across_cus(&self.compile_units, func.entry).or(Some(addr))
        } else {
            Some(addr)
        }
    }

    /// Builds a `Locator` from already-decoded tables instead of parsing
    /// a binary, so callers elsewhere in the crate can exercise
    /// `func_to_addr`/`file_line_to_addr` against synthetic data in
    /// tests.
    #[cfg(test)]
    pub(crate) fn for_test(
        functions: Vec<(&str, u64)>,
        compile_units: Vec<Vec<LineRow>>,
    ) -> Locator {
        let functions: Vec<FunctionSymbol> = functions
            .into_iter()
            .map(|(name, entry)| FunctionSymbol {
                name: name.to_string(),
                entry,
            })
            .collect();

        let mut pc_index: Vec<LineRow> = compile_units.iter().flatten().cloned().collect();
        pc_index.sort_by_key(|r| r.address);

        let mut file_line_index: HashMap<(String, u64), u64> = HashMap::new();
        for row in &pc_index {
            if row.line == 0 {
                continue;
            }
            let key = (row.file.clone(), row.line);
            file_line_index
                .entry(key)
                .and_modify(|addr| *addr = (*addr).min(row.address))
                .or_insert(row.address);
        }

        Locator {
            functions,
            compile_units,
            pc_index,
            file_line_index,
        }
    }
}

fn section_data<'a>(elf: &Elf, data: &'a [u8], name: &str) -> Option<&'a [u8]> {
    for shdr in &elf.section_headers {
        if elf.shdr_strtab.get_at(shdr.sh_name) == Some(name) {
            let start = shdr.sh_offset as usize;
            let end = start + shdr.sh_size as usize;
            return data.get(start..end);
        }
    }
    None
}

fn parse_function_symbols(elf: &Elf) -> Vec<FunctionSymbol> {
    let mut functions = Vec::new();
    for sym in elf.syms.iter() {
        if sym.st_type() != goblin::elf::sym::STT_FUNC || sym.st_value == 0 {
            continue;
        }
        if let Some(name) = elf.strtab.get_at(sym.st_name) {
            if !name.is_empty() {
                functions.push(FunctionSymbol {
                    name: name.to_string(),
                    entry: sym.st_value,
                });
            }
        }
    }
    functions
}

fn dwarf_file_name<R: Reader>(
    dwarf: &gimli::Dwarf<R>,
    unit: &gimli::Unit<R>,
    header: &gimli::LineProgramHeader<R>,
    file: &gimli::FileEntry<R>,
) -> String {
    let mut path = String::new();
    if let Some(dir_attr) = file.directory(header) {
        if let Ok(dir) = dwarf.attr_string(unit, dir_attr) {
            if let Ok(dir) = dir.to_string_lossy() {
                if !dir.is_empty() {
                    path.push_str(&dir);
                    path.push('/');
                }
            }
        }
    }
    if let Ok(name) = dwarf.attr_string(unit, file.path_name()) {
        if let Ok(name) = name.to_string_lossy() {
            path.push_str(&name);
        }
    }
    path
}

fn parse_compile_units<R: Reader>(dwarf: &gimli::Dwarf<R>) -> Result<Vec<Vec<LineRow>>, gimli::Error> {
    let mut compile_units = Vec::new();
    let mut headers = dwarf.units();
    while let Some(header) = headers.next()? {
        let unit = dwarf.unit(header)?;
        let Some(program) = unit.line_program.clone() else {
            continue;
        };
        let mut rows = program.rows();
        let mut cu_rows = Vec::new();
        while let Some((header, row)) = rows.next_row()? {
            if row.end_sequence() {
                // One-past-last-instruction marker; its file/line are
                // meaningless and it must not shadow real rows in
                // `pc_to_file_line`'s nearest-preceding lookup.
                continue;
            }
            let file = row
                .file(header)
                .map(|f| dwarf_file_name(dwarf, &unit, header, f))
                .unwrap_or_default();
            let line = row.line().map(|l| l.get()).unwrap_or(0);
            cu_rows.push(LineRow {
                address: row.address(),
                file,
                line,
                prologue_end: row.prologue_end(),
            });
        }
        compile_units.push(cu_rows);
    }
    Ok(compile_units)
}

/// Scans compile units in order; within each one, once a row matching
/// `entry` is seen, scans forward for the first subsequent
/// `prologue_end` row, stopping at the compile-unit boundary. Factored
/// out of the parsing step so it can be tested against synthetic line
/// tables.
pub fn find_prologue_end_across_cus(compile_units: &[Vec<LineRow>], entry: u64) -> Option<u64> {
    for cu in compile_units {
        if let Some(addr) = find_prologue_end_in_cu(cu, entry) {
            return Some(addr);
        }
    }
    None
}

fn find_prologue_end_in_cu(cu_rows: &[LineRow], entry: u64) -> Option<u64> {
    let idx = cu_rows.iter().position(|r| r.address == entry)?;
    cu_rows[idx + 1..]
        .iter()
        .find(|r| r.prologue_end)
        .map(|r| r.address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(address: u64, file: &str, line: u64, prologue_end: bool) -> LineRow {
        LineRow {
            address,
            file: file.to_string(),
            line,
            prologue_end,
        }
    }

    #[test]
    fn prologue_end_found_after_entry_in_same_cu() {
        let cu = vec![
            row(0x1000, "main.go", 10, false),
            row(0x1000, "main.go", 10, false),
            row(0x1004, "main.go", 11, false),
            row(0x1008, "main.go", 12, true),
        ];
        assert_eq!(find_prologue_end_in_cu(&cu, 0x1000), Some(0x1008));
    }

    #[test]
    fn tie_break_is_first_matching_row() {
        let cu = vec![
            row(0x1000, "main.go", 10, false),
            row(0x1004, "main.go", 11, true),
            row(0x1008, "main.go", 12, true),
        ];
        assert_eq!(find_prologue_end_in_cu(&cu, 0x1000), Some(0x1004));
    }

    #[test]
    fn no_entry_row_yields_none() {
        let cu = vec![row(0x1004, "main.go", 11, true)];
        assert_eq!(find_prologue_end_in_cu(&cu, 0x1000), None);
    }

    #[test]
    fn no_prologue_end_after_entry_yields_none() {
        let cu = vec![
            row(0x1000, "main.go", 10, false),
            row(0x1004, "main.go", 11, false),
        ];
        assert_eq!(find_prologue_end_in_cu(&cu, 0x1000), None);
    }

    #[test]
    fn scan_does_not_cross_compile_unit_boundaries() {
        let cu_a = vec![row(0x1000, "a.go", 1, false)];
        let cu_b = vec![
            row(0x1000, "b.go", 1, false),
            row(0x1004, "b.go", 2, true),
        ];
        // cu_a "contains" entry 0x1000 too but has no prologue_end row
        // after it; the scan must fall through to cu_b rather than
        // stopping.
        assert_eq!(
            find_prologue_end_across_cus(&[cu_a, cu_b], 0x1000),
            Some(0x1004)
        );
    }

    #[test]
    fn pc_to_file_line_picks_nearest_preceding_row() {
        let loc = Locator {
            functions: vec![],
            compile_units: vec![],
            pc_index: vec![
                row(0x1000, "main.go", 10, false),
                row(0x1010, "main.go", 11, false),
            ],
            file_line_index: HashMap::new(),
        };
        assert_eq!(loc.pc_to_file_line(0x1005), ("main.go".to_string(), 10));
        assert_eq!(loc.pc_to_file_line(0x1010), ("main.go".to_string(), 11));
        assert_eq!(loc.pc_to_file_line(0x0), (String::new(), 0));
    }

    #[test]
    fn file_line_to_addr_redirects_entry_address_to_prologue_end() {
        let mut file_line_index = HashMap::new();
        file_line_index.insert(("main.go".to_string(), 7), 0x1000);
        let loc = Locator {
            functions: vec![FunctionSymbol {
                name: "main.main".to_string(),
                entry: 0x1000,
            }],
            compile_units: vec![vec![
                row(0x1000, "main.go", 7, false),
                row(0x1008, "main.go", 8, true),
            ]],
            pc_index: vec![],
            file_line_index,
        };
        assert_eq!(loc.file_line_to_addr("main.go", 7), Some(0x1008));
    }

    #[test]
    fn file_line_to_addr_missing_location_is_none() {
        let loc = Locator {
            functions: vec![],
            compile_units: vec![],
            pc_index: vec![],
            file_line_index: HashMap::new(),
        };
        assert_eq!(loc.file_line_to_addr("nope.go", 1), None);
    }
}
